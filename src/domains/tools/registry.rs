//! Tool Registry - the live, hot-reloadable tool catalogue.
//!
//! The catalogue is an immutable snapshot behind an `Arc`. Reload and
//! registration build a complete replacement off to the side and publish it
//! with a single pointer swap, so concurrent lookups always see one whole
//! generation. Writers are serialized; readers never wait on a writer's I/O.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::ToolError;
use super::backends::Backends;
use super::definition::ToolDefinition;
use super::handlers::ToolHandler;
use crate::domains::store::ToolStore;

// ============================================================================
// Catalogue
// ============================================================================

/// A definition together with its bound handler.
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: ToolHandler,
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// One immutable generation of the tool catalogue.
#[derive(Default)]
pub struct Catalogue {
    generation: u64,
    entries: Vec<Arc<RegisteredTool>>,
    index: HashMap<String, usize>,
}

impl Catalogue {
    /// Build a catalogue, keeping the first definition seen for each name.
    fn build(generation: u64, definitions: Vec<ToolDefinition>, backends: &Backends) -> Self {
        let mut catalogue = Self {
            generation,
            ..Default::default()
        };

        for definition in definitions {
            if catalogue.contains(&definition.name) {
                warn!(
                    name = %definition.name,
                    id = ?definition.id,
                    "Duplicate tool name in store, keeping first definition"
                );
                continue;
            }
            let handler = ToolHandler::bind(&definition, backends);
            catalogue.push(Arc::new(RegisteredTool {
                definition,
                handler,
            }));
        }

        catalogue
    }

    /// Copy of this generation with one more tool appended.
    fn with_tool(&self, tool: Arc<RegisteredTool>) -> Self {
        let mut next = Self {
            generation: self.generation,
            entries: self.entries.clone(),
            index: self.index.clone(),
        };
        next.push(tool);
        next
    }

    fn push(&mut self, tool: Arc<RegisteredTool>) {
        self.index
            .insert(tool.definition.lookup_key(), self.entries.len());
        self.entries.push(tool);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_lowercase())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.index
            .get(&name.to_lowercase())
            .map(|&idx| self.entries[idx].clone())
    }

    /// Tools in insertion order.
    pub fn tools(&self) -> impl Iterator<Item = &Arc<RegisteredTool>> {
        self.entries.iter()
    }
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Owns the live catalogue and keeps it in sync with the tool store.
pub struct ToolRegistry {
    store: Arc<dyn ToolStore>,
    backends: Backends,
    live: RwLock<Arc<Catalogue>>,
    writer: Mutex<()>,
}

impl ToolRegistry {
    /// Create a registry with an empty catalogue. Call [`reload`](Self::reload)
    /// to populate it from the store.
    pub fn new(store: Arc<dyn ToolStore>, backends: Backends) -> Self {
        Self {
            store,
            backends,
            live: RwLock::new(Arc::new(Catalogue::default())),
            writer: Mutex::new(()),
        }
    }

    /// The current catalogue generation.
    pub fn snapshot(&self) -> Arc<Catalogue> {
        self.live.read().clone()
    }

    fn publish(&self, catalogue: Catalogue) {
        *self.live.write() = Arc::new(catalogue);
    }

    /// Replace the catalogue with the store's current contents.
    ///
    /// On a store failure the previous catalogue stays live.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<usize, ToolError> {
        let _writer = self.writer.lock().await;

        let definitions = self.store.list().await.map_err(|e| {
            warn!(error = %e, "Tool reload failed, keeping current catalogue");
            ToolError::StoreUnavailable(e.to_string())
        })?;

        let generation = self.snapshot().generation() + 1;
        let catalogue = Catalogue::build(generation, definitions, &self.backends);
        let count = catalogue.len();
        self.publish(catalogue);

        info!(generation, tools = count, "Tool catalogue reloaded");
        Ok(count)
    }

    /// Add one tool to the live catalogue.
    ///
    /// With `persist`, the definition is written to the store first and takes
    /// the id the store assigns; if that write fails nothing is registered.
    #[instrument(skip(self, definition), fields(name = %definition.name))]
    pub async fn register(
        &self,
        definition: ToolDefinition,
        persist: bool,
    ) -> Result<Arc<RegisteredTool>, ToolError> {
        let _writer = self.writer.lock().await;

        let current = self.snapshot();
        if current.contains(&definition.name) {
            return Err(ToolError::DuplicateName(definition.name));
        }

        let definition = if persist {
            let id = self.store.insert(&definition).await.map_err(|e| {
                warn!(error = %e, "Failed to persist tool definition");
                ToolError::PersistenceFailed(e.to_string())
            })?;
            definition.with_id(id)
        } else {
            definition
        };

        let handler = ToolHandler::bind(&definition, &self.backends);
        let tool = Arc::new(RegisteredTool {
            definition,
            handler,
        });
        self.publish(current.with_tool(tool.clone()));

        info!(kind = tool.definition.kind().as_str(), persisted = persist, "Tool registered");
        Ok(tool)
    }

    /// Case-insensitive lookup in the live catalogue.
    pub fn lookup(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.snapshot().get(name)
    }

    /// Definitions of the live catalogue, in insertion order.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.snapshot()
            .tools()
            .map(|t| t.definition.clone())
            .collect()
    }

    /// Names of the live catalogue, in insertion order.
    pub fn tool_names(&self) -> Vec<String> {
        self.snapshot()
            .tools()
            .map(|t| t.definition.name.clone())
            .collect()
    }
}
