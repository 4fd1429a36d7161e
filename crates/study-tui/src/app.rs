use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use study_core::{
    ChatMessage, Config, ModelRequest, ModelResponse, OllamaClient, PromptTemplate,
    ReplySequencer, StudyMaterial, StudyMaterials,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// What the last `/api/tags` call said about the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Checking,
    Online,
    Offline,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Question input
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Chat history
    pub chat_messages: Vec<ChatMessage>,
    pub chat_scroll: u16,
    pub chat_height: u16,      // Height of chat area for scroll calculations
    pub chat_total_lines: u16, // Wrapped line count measured at the last render
    pub follow_chat: bool,     // Keep the view pinned to the newest line
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // File path prompt
    pub show_file_prompt: bool,
    pub file_input: String,
    pub file_input_cursor: usize,

    // Modal error dialog, blocks all other input while shown
    pub error_dialog: Option<String>,

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Server state
    pub server_status: ServerStatus,
    pub model_installed: Option<bool>,

    // Prompting
    pub template: PromptTemplate,
    pub materials: StudyMaterials,
    pub gateway: OllamaClient,
    pub sequencer: ReplySequencer<ModelResponse>,
}

impl App {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let template = config.load_template()?;
        let gateway = OllamaClient::new(&config.gateway_config())?;

        tracing::info!(model = gateway.model(), host = gateway.base_url(), "study assistant ready");

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            input_cursor: 0,

            chat_messages: Vec::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_total_lines: 0,
            follow_chat: true,
            chat_area: None,

            animation_frame: 0,

            show_file_prompt: false,
            file_input: String::new(),
            file_input_cursor: 0,

            error_dialog: None,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            server_status: ServerStatus::Checking,
            model_installed: None,

            template,
            materials: StudyMaterials::new(),
            gateway,
            sequencer: ReplySequencer::new(),
        })
    }

    pub fn selected_model(&self) -> &str {
        self.gateway.model()
    }

    /// Requests sent but not yet shown in the chat.
    pub fn pending_requests(&self) -> usize {
        self.sequencer.pending()
    }

    pub fn is_waiting(&self) -> bool {
        self.pending_requests() > 0
    }

    /// Turn the input box into a request. Blank input produces nothing.
    pub fn submit_question(&mut self) -> Option<ModelRequest> {
        let question = self.input.trim().to_string();
        if question.is_empty() {
            return None;
        }

        self.chat_messages.push(ChatMessage::user(question.as_str()));
        self.input.clear();
        self.input_cursor = 0;

        let study_materials = self.materials.for_question(&question);
        let prompt = self.template.render(&question, &study_materials);
        let id = self.sequencer.issue();

        // Scroll to bottom so "Thinking..." is visible
        self.scroll_chat_to_bottom();

        Some(ModelRequest { id, prompt })
    }

    /// Show a finished request, keeping replies in the order questions were asked.
    pub fn apply_response(&mut self, response: ModelResponse) {
        let id = response.id;
        let ready = self.sequencer.accept(id, response);
        if ready.is_empty() {
            tracing::debug!(id, held = self.sequencer.held(), "response held for earlier request");
            return;
        }

        self.chat_messages
            .extend(ready.into_iter().map(ModelResponse::into_message));
        self.scroll_chat_to_bottom();
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.chat_messages.push(ChatMessage::system(text));
        self.scroll_chat_to_bottom();
    }

    /// Load a text file as study material. Failures open the error dialog
    /// and leave everything else as it was.
    pub fn attach_material(&mut self, path: &str) {
        let path = expand_home(path.trim());
        match StudyMaterial::load(&path) {
            Ok(material) => {
                self.chat_messages.push(ChatMessage::user(material.upload_notice()));
                self.materials.attach(material);
                self.scroll_chat_to_bottom();
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load study material");
                self.error_dialog = Some(format!("Failed to read file: {}", e));
            }
        }
    }

    pub fn detach_material(&mut self) {
        if let Some(material) = self.materials.detach() {
            self.push_system(format!("Study material removed: {}", material.file_name()));
        }
    }

    pub fn open_file_prompt(&mut self) {
        self.show_file_prompt = true;
        self.file_input.clear();
        self.file_input_cursor = 0;
    }

    pub fn close_file_prompt(&mut self) {
        self.show_file_prompt = false;
        self.file_input.clear();
        self.file_input_cursor = 0;
    }

    pub fn apply_models(&mut self, result: Result<Vec<String>, String>, open_picker: bool) {
        match result {
            Ok(models) => {
                self.server_status = ServerStatus::Online;
                self.model_installed = Some(models.iter().any(|m| m == self.gateway.model()));
                self.available_models = models;

                if open_picker {
                    if self.available_models.is_empty() {
                        self.push_system(format!(
                            "No models found. Pull a model with: ollama pull {}",
                            self.gateway.model()
                        ));
                    } else {
                        // Select current model if in list, otherwise first
                        let current_idx = self
                            .available_models
                            .iter()
                            .position(|m| m == self.gateway.model())
                            .unwrap_or(0);
                        self.model_picker_state.select(Some(current_idx));
                        self.show_model_picker = true;
                    }
                }
            }
            Err(e) => {
                self.server_status = ServerStatus::Offline;
                if open_picker {
                    self.push_system(format!("Error: {}", e));
                }
            }
        }
    }

    // Model picker methods
    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Switch to the highlighted model. Requests already running keep theirs.
    pub fn select_model(&mut self) {
        let selected = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned();

        if let Some(model) = selected {
            self.gateway = self.gateway.with_model(&model);
            self.model_installed = Some(true);
            self.show_model_picker = false;
            tracing::info!(model = %model, "model selected");
            // Save to config
            if let Err(e) = Config::save_default_model(&model) {
                tracing::warn!(error = %e, "could not save default model");
                self.push_system(format!(
                    "Using {} for this session only; could not save config: {}",
                    model, e
                ));
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        let max = self.max_chat_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_chat = self.chat_scroll == max;
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_chat = false;
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_chat_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_chat_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_chat_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_chat = false;
    }

    /// Pin the view to the newest line. The exact offset is settled at the
    /// next render, once the wrapped height of the new content is known.
    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_chat = true;
        self.chat_scroll = self.max_chat_scroll();
    }

    /// Record the wrapped height of the chat pane and clamp the scroll offset to it.
    pub fn set_chat_total_lines(&mut self, total: u16) {
        self.chat_total_lines = total;
        let max = self.max_chat_scroll();
        self.chat_scroll = if self.follow_chat { max } else { self.chat_scroll.min(max) };
    }

    fn max_chat_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }
}

fn expand_home(path: &str) -> std::path::PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| std::path::PathBuf::from(path)),
        None => std::path::PathBuf::from(path),
    }
}
