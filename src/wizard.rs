//! The four-step blueprint wizard.
//!
//! Each generation goes through `begin_*` (guards, marks the session loading, builds the request),
//! an awaited [`GenerationRequest::dispatch`], and [`Wizard::finish`] (merges or records the
//! failure). Callers that keep the wizard behind a lock run the dispatch with the lock released;
//! everyone else can use the async convenience methods.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::draft::{ApiEdit, DraftDocument, DraftField, DraftPatch, PageEdit};
use crate::gateway::{GenerationError, GenerationGateway};
use crate::models::{ApiEndpoint, ProjectInput, SavePayload, SchemaModification, Table};

/// Appended to the color preferences when the styling step is regenerated.
pub const STYLING_VARIATION_HINT: &str = "Try different shades";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum Step {
    PagePlan = 1,
    Styling = 2,
    ApiPlan = 3,
    Schema = 4,
}

impl Step {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<Step> {
        match self {
            Step::PagePlan => Some(Step::Styling),
            Step::Styling => Some(Step::ApiPlan),
            Step::ApiPlan => Some(Step::Schema),
            Step::Schema => None,
        }
    }

    pub fn owned_field(self) -> DraftField {
        match self {
            Step::PagePlan => DraftField::Pages,
            Step::Styling => DraftField::Styling,
            Step::ApiPlan => DraftField::Apis,
            Step::Schema => DraftField::DatabaseSchema,
        }
    }
}

impl TryFrom<u8> for Step {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Step::PagePlan),
            2 => Ok(Step::Styling),
            3 => Ok(Step::ApiPlan),
            4 => Ok(Step::Schema),
            other => Err(format!("step must be between 1 and 4, got {other}")),
        }
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> Self {
        step.number()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Initialize,
    Advance,
    Regenerate,
}

impl Trigger {
    pub fn failure_message(self) -> &'static str {
        match self {
            Trigger::Initialize => "Failed to generate page plan. Please try again.",
            Trigger::Advance => "Failed to progress to the next step. Please try again.",
            Trigger::Regenerate => "Failed to regenerate. Please try again.",
        }
    }
}

/// One call to the generation service, with everything it needs captured up front.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    SinglePagePlan(ProjectInput),
    MultiplePagePlan(ProjectInput),
    StylingPlan(ProjectInput),
    ApiPlan(String),
    Schema(String),
}

impl GenerationRequest {
    pub async fn dispatch(&self, gateway: &dyn GenerationGateway) -> Result<DraftPatch, GenerationError> {
        match self {
            GenerationRequest::SinglePagePlan(input) => {
                gateway.generate_single_page_plan(input).await.map(|plan| DraftPatch::Pages(plan.pages))
            }
            GenerationRequest::MultiplePagePlan(input) => {
                gateway.generate_multiple_page_plan(input).await.map(|plan| DraftPatch::Pages(plan.pages))
            }
            GenerationRequest::StylingPlan(input) => gateway.generate_styling_plan(input).await.map(DraftPatch::Styling),
            GenerationRequest::ApiPlan(description) => gateway.generate_api_plan(description).await.map(DraftPatch::Apis),
            GenerationRequest::Schema(description) => {
                gateway.generate_schema(description).await.map(DraftPatch::DatabaseSchema)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingGeneration {
    pub step: Step,
    pub trigger: Trigger,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone)]
pub struct SchemaModificationRequest {
    pub schema: Vec<Table>,
    pub instruction: String,
}

impl SchemaModificationRequest {
    pub async fn dispatch(&self, gateway: &dyn GenerationGateway) -> Result<SchemaModification, GenerationError> {
        gateway.modify_schema(&self.schema, &self.instruction).await
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ErrorSurface {
    #[default]
    Ok,
    Failed {
        message: String,
        step: Step,
        trigger: Trigger,
    },
}

impl ErrorSurface {
    pub fn is_failed(&self) -> bool {
        matches!(self, ErrorSurface::Failed { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ErrorSurface::Ok => None,
            ErrorSurface::Failed { message, .. } => Some(message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub current_step: Step,
    pub loading: bool,
    pub error: ErrorSurface,
    /// Row of `apis` currently in edit mode.
    pub editing_api_index: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct NewPage {
    pub name: String,
    pub purpose: String,
}

/// Input buffers for things the user is about to add.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Scratch {
    pub new_page: NewPage,
    pub new_api: ApiEndpoint,
    /// Pending component text keyed by page index.
    pub new_components: BTreeMap<usize, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SchemaPrompt {
    pub open: bool,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("a generation call is already in progress")]
    Busy,
    #[error("there is no failed generation to retry")]
    NoFailure,
    #[error("the last generation failed; retry or regenerate first")]
    UnresolvedFailure,
    #[error("only available on the schema step")]
    NotAtFinalStep,
    #[error("could not serialize the draft for a generation prompt: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A user intent that only touches local state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DraftEdit {
    EditPage { page_index: usize, edit: PageEdit },
    DeletePage { page_index: usize },
    SetNewPage { name: String, purpose: String },
    AddPage,
    EditComponent { page_index: usize, component_index: usize, value: String },
    DeleteComponent { page_index: usize, component_index: usize },
    SetNewComponent { page_index: usize, text: String },
    AddComponent { page_index: usize },
    ReorderComponents {
        page_index: usize,
        from: usize,
        #[serde(default)]
        to: Option<usize>,
    },
    EditColor { role: String, value: String },
    EditApi { index: usize, edit: ApiEdit },
    DeleteApi { index: usize },
    SetNewApi { entry: ApiEndpoint },
    AddApi,
    BeginApiEdit { index: usize },
    EndApiEdit,
    OpenSchemaPrompt,
    SetSchemaPrompt { text: String },
    CloseSchemaPrompt,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Wizard {
    input: ProjectInput,
    draft: DraftDocument,
    state: WizardState,
    scratch: Scratch,
    schema_prompt: SchemaPrompt,
}

impl Wizard {
    pub fn new(input: ProjectInput) -> Self {
        Self {
            input,
            draft: DraftDocument::default(),
            state: WizardState {
                current_step: Step::PagePlan,
                loading: false,
                error: ErrorSurface::Ok,
                editing_api_index: None,
            },
            scratch: Scratch::default(),
            schema_prompt: SchemaPrompt::default(),
        }
    }

    pub fn input(&self) -> &ProjectInput {
        &self.input
    }

    pub fn draft(&self) -> &DraftDocument {
        &self.draft
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn current_step(&self) -> Step {
        self.state.current_step
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    pub fn schema_prompt(&self) -> &SchemaPrompt {
        &self.schema_prompt
    }

    pub fn error(&self) -> &ErrorSurface {
        &self.state.error
    }

    /// Builds the request for `step`. Regenerating styling asks for different shades.
    fn request_for(&self, step: Step, trigger: Trigger) -> Result<GenerationRequest, WizardError> {
        let request = match step {
            Step::PagePlan if self.input.app_type.is_single_page() => GenerationRequest::SinglePagePlan(self.input.clone()),
            Step::PagePlan => GenerationRequest::MultiplePagePlan(self.input.clone()),
            Step::Styling => {
                let mut input = self.input.clone();
                if trigger == Trigger::Regenerate {
                    input.colors = match input.colors.trim() {
                        "" => STYLING_VARIATION_HINT.to_string(),
                        colors => format!("{colors} {STYLING_VARIATION_HINT}"),
                    };
                }
                GenerationRequest::StylingPlan(input)
            }
            Step::ApiPlan => GenerationRequest::ApiPlan(format!(
                "Purpose: {}, Page details: {}",
                self.input.purpose,
                serde_json::to_string(&self.draft.pages)?
            )),
            Step::Schema => GenerationRequest::Schema(format!(
                "Purpose: {}, API details: {}",
                self.input.purpose,
                serde_json::to_string(&self.draft.apis)?
            )),
        };
        Ok(request)
    }

    fn ensure_idle(&self) -> Result<(), WizardError> {
        if self.state.loading {
            warn!("⏳ Refusing action while step {} is generating", self.state.current_step.number());
            return Err(WizardError::Busy);
        }
        Ok(())
    }

    fn start(&mut self, step: Step, trigger: Trigger, request: GenerationRequest) -> PendingGeneration {
        info!("🚀 Dispatching {:?} generation for step {}", trigger, step.number());
        self.state.loading = true;
        self.state.error = ErrorSurface::Ok;
        PendingGeneration { step, trigger, request }
    }

    /// Page-plan call for step 1. Does nothing once the wizard has moved past the first step.
    pub fn begin_initialize(&mut self) -> Result<Option<PendingGeneration>, WizardError> {
        self.ensure_idle()?;
        if self.state.current_step != Step::PagePlan {
            return Ok(None);
        }
        let request = self.request_for(Step::PagePlan, Trigger::Initialize)?;
        Ok(Some(self.start(Step::PagePlan, Trigger::Initialize, request)))
    }

    /// Moves to the next step and prepares its generation. The step does not roll back on failure.
    pub fn begin_advance(&mut self) -> Result<Option<PendingGeneration>, WizardError> {
        self.ensure_idle()?;
        if self.state.error.is_failed() {
            warn!("Refusing to advance past a failed step {}", self.state.current_step.number());
            return Err(WizardError::UnresolvedFailure);
        }
        let Some(next) = self.state.current_step.next() else {
            return Ok(None);
        };
        let request = self.request_for(next, Trigger::Advance)?;
        self.state.current_step = next;
        Ok(Some(self.start(next, Trigger::Advance, request)))
    }

    pub fn begin_regenerate(&mut self) -> Result<PendingGeneration, WizardError> {
        self.ensure_idle()?;
        let step = self.state.current_step;
        let request = self.request_for(step, Trigger::Regenerate)?;
        Ok(self.start(step, Trigger::Regenerate, request))
    }

    /// Same call as regenerate, but only offered while a failure is showing.
    pub fn begin_retry(&mut self) -> Result<PendingGeneration, WizardError> {
        self.ensure_idle()?;
        if !self.state.error.is_failed() {
            return Err(WizardError::NoFailure);
        }
        self.begin_regenerate()
    }

    /// Completes a dispatched generation. Returns whether the draft was updated.
    pub fn finish(&mut self, pending: PendingGeneration, outcome: Result<DraftPatch, GenerationError>) -> bool {
        self.state.loading = false;
        match outcome {
            Ok(patch) if patch.field() != pending.step.owned_field() => {
                error!(
                    "❌ Step {} produced a {:?} result it does not own; discarding it",
                    pending.step.number(),
                    patch.field()
                );
                false
            }
            Ok(patch) => {
                match patch.field() {
                    DraftField::Pages => self.scratch.new_components.clear(),
                    DraftField::Apis => self.state.editing_api_index = None,
                    DraftField::Styling | DraftField::DatabaseSchema => {}
                }
                self.draft.apply(patch);
                self.state.error = ErrorSurface::Ok;
                info!("✅ Step {} {:?} merged", pending.step.number(), pending.trigger);
                true
            }
            Err(e) => {
                error!("❌ Step {} {:?} generation failed: {}", pending.step.number(), pending.trigger, e);
                self.state.error = ErrorSurface::Failed {
                    message: pending.trigger.failure_message().to_string(),
                    step: pending.step,
                    trigger: pending.trigger,
                };
                false
            }
        }
    }

    async fn run(&mut self, pending: Option<PendingGeneration>, gateway: &dyn GenerationGateway) -> bool {
        let Some(pending) = pending else { return false };
        let outcome = pending.request.dispatch(gateway).await;
        self.finish(pending, outcome)
    }

    pub async fn initialize(&mut self, gateway: &dyn GenerationGateway) -> Result<bool, WizardError> {
        let pending = self.begin_initialize()?;
        Ok(self.run(pending, gateway).await)
    }

    pub async fn advance(&mut self, gateway: &dyn GenerationGateway) -> Result<bool, WizardError> {
        let pending = self.begin_advance()?;
        Ok(self.run(pending, gateway).await)
    }

    pub async fn regenerate(&mut self, gateway: &dyn GenerationGateway) -> Result<bool, WizardError> {
        let pending = self.begin_regenerate()?;
        Ok(self.run(Some(pending), gateway).await)
    }

    pub async fn retry(&mut self, gateway: &dyn GenerationGateway) -> Result<bool, WizardError> {
        let pending = self.begin_retry()?;
        Ok(self.run(Some(pending), gateway).await)
    }

    /// Edits a seed field. Returns true when the page plan has to be generated again, which is
    /// the case while the wizard is still on the first step.
    pub fn edit_input(&mut self, field: &str, value: String) -> Result<bool, WizardError> {
        self.ensure_idle()?;
        self.input.set_field(field, value);
        Ok(self.state.current_step == Step::PagePlan)
    }

    pub async fn update_input(
        &mut self,
        gateway: &dyn GenerationGateway,
        field: &str,
        value: String,
    ) -> Result<bool, WizardError> {
        if self.edit_input(field, value)? {
            return self.initialize(gateway).await;
        }
        Ok(false)
    }

    /// Applies a local edit. Returns whether anything changed; stale indices are ignored.
    pub fn apply_edit(&mut self, edit: DraftEdit) -> Result<bool, WizardError> {
        self.ensure_idle()?;
        let changed = match edit {
            DraftEdit::EditPage { page_index, edit } => self.draft.edit_page(page_index, edit),
            DraftEdit::DeletePage { page_index } => {
                let removed = self.draft.delete_page(page_index);
                if removed {
                    self.shift_component_buffers(page_index);
                }
                removed
            }
            DraftEdit::SetNewPage { name, purpose } => {
                self.scratch.new_page = NewPage { name, purpose };
                true
            }
            DraftEdit::AddPage => {
                let NewPage { name, purpose } = &self.scratch.new_page;
                let added = self.draft.add_page(name, purpose);
                if added {
                    self.scratch.new_page = NewPage::default();
                }
                added
            }
            DraftEdit::EditComponent { page_index, component_index, value } => {
                self.draft.edit_component(page_index, component_index, value)
            }
            DraftEdit::DeleteComponent { page_index, component_index } => {
                self.draft.delete_component(page_index, component_index)
            }
            DraftEdit::SetNewComponent { page_index, text } => {
                if page_index >= self.draft.pages.len() {
                    false
                } else {
                    self.scratch.new_components.insert(page_index, text);
                    true
                }
            }
            DraftEdit::AddComponent { page_index } => {
                let text = self.scratch.new_components.get(&page_index).cloned().unwrap_or_default();
                let added = self.draft.add_component(page_index, text);
                if added {
                    self.scratch.new_components.remove(&page_index);
                }
                added
            }
            DraftEdit::ReorderComponents { page_index, from, to } => self.draft.reorder_components(page_index, from, to),
            DraftEdit::EditColor { role, value } => self.draft.edit_color(&role, value),
            DraftEdit::EditApi { index, edit } => self.draft.edit_api(index, edit),
            DraftEdit::DeleteApi { index } => {
                let removed = self.draft.delete_api(index);
                if removed {
                    self.state.editing_api_index = match self.state.editing_api_index {
                        Some(editing) if editing == index => None,
                        Some(editing) if editing > index => Some(editing - 1),
                        other => other,
                    };
                }
                removed
            }
            DraftEdit::SetNewApi { entry } => {
                self.scratch.new_api = entry;
                true
            }
            DraftEdit::AddApi => {
                let entry = std::mem::take(&mut self.scratch.new_api);
                self.draft.add_api(entry);
                true
            }
            DraftEdit::BeginApiEdit { index } => {
                if index < self.draft.api_count() {
                    self.state.editing_api_index = Some(index);
                    true
                } else {
                    false
                }
            }
            DraftEdit::EndApiEdit => self.state.editing_api_index.take().is_some(),
            DraftEdit::OpenSchemaPrompt => {
                self.schema_prompt.open = true;
                true
            }
            DraftEdit::SetSchemaPrompt { text } => {
                self.schema_prompt.text = text;
                true
            }
            DraftEdit::CloseSchemaPrompt => {
                self.close_schema_prompt();
                true
            }
        };
        Ok(changed)
    }

    fn shift_component_buffers(&mut self, deleted_page: usize) {
        self.scratch.new_components = std::mem::take(&mut self.scratch.new_components)
            .into_iter()
            .filter(|(page, _)| *page != deleted_page)
            .map(|(page, text)| if page > deleted_page { (page - 1, text) } else { (page, text) })
            .collect();
    }

    fn close_schema_prompt(&mut self) {
        self.schema_prompt = SchemaPrompt::default();
    }

    /// Prepares a prompt-driven schema change. A blank prompt is ignored and leaves the dialog open.
    pub fn begin_schema_modification(
        &mut self,
        prompt: Option<String>,
    ) -> Result<Option<SchemaModificationRequest>, WizardError> {
        self.ensure_idle()?;
        if self.state.current_step != Step::Schema {
            return Err(WizardError::NotAtFinalStep);
        }
        if self.state.error.is_failed() {
            return Err(WizardError::UnresolvedFailure);
        }
        if let Some(text) = prompt {
            self.schema_prompt.text = text;
        }
        if self.schema_prompt.text.trim().is_empty() {
            return Ok(None);
        }
        self.state.loading = true;
        Ok(Some(SchemaModificationRequest {
            schema: self.draft.database_schema.clone().unwrap_or_default(),
            instruction: self.schema_prompt.text.clone(),
        }))
    }

    /// Failures are only logged here; they never reach the error banner.
    pub fn finish_schema_modification(&mut self, outcome: Result<SchemaModification, GenerationError>) -> bool {
        self.state.loading = false;
        let applied = match outcome {
            Ok(modification) => {
                info!("✅ Schema modified ({} tables)", modification.database_schema.len());
                self.draft.apply(DraftPatch::DatabaseSchema(modification.database_schema));
                true
            }
            Err(e) => {
                error!("❌ Error modifying schema: {}", e);
                false
            }
        };
        self.close_schema_prompt();
        applied
    }

    pub async fn modify_schema_by_prompt(
        &mut self,
        gateway: &dyn GenerationGateway,
        prompt: &str,
    ) -> Result<bool, WizardError> {
        let Some(request) = self.begin_schema_modification(Some(prompt.to_string()))? else {
            return Ok(false);
        };
        let outcome = request.dispatch(gateway).await;
        Ok(self.finish_schema_modification(outcome))
    }

    pub fn build_save_payload(&self) -> SavePayload {
        self.draft.save_payload(&self.input)
    }

    /// The hand-off: only the schema step with a settled, successful state can be saved.
    pub fn save(&self) -> Result<SavePayload, WizardError> {
        self.ensure_idle()?;
        if self.state.current_step != Step::Schema {
            return Err(WizardError::NotAtFinalStep);
        }
        if self.state.error.is_failed() {
            return Err(WizardError::UnresolvedFailure);
        }
        Ok(self.build_save_payload())
    }
}
