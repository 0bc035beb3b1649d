//! Catalog of callable tools.

use crate::tool::contract::{Tool, ToolDescriptor};
use crate::tool::data_kind::DataKindRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolRegistryError {
    #[error("tool id already registered: {0}")]
    DuplicateTool(String),

    #[error("tool id cannot be empty")]
    EmptyToolId,

    #[error("data kind '{kind}' declared by '{owner}' conflicts with declaration in '{other}'")]
    ConflictingDataKind {
        kind: String,
        owner: String,
        other: String,
    },
}

/// Declarative catalog of tools plus the data kinds they emit.
///
/// Cheap to clone; tools are shared behind `Arc`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    data_kinds: DataKindRegistry,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool and its declared data kinds.
    ///
    /// Nothing is registered when the call fails.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolRegistryError> {
        let descriptor = tool.descriptor();
        if descriptor.id.trim().is_empty() {
            return Err(ToolRegistryError::EmptyToolId);
        }
        if self.tools.contains_key(&descriptor.id) {
            return Err(ToolRegistryError::DuplicateTool(descriptor.id));
        }
        let mut kinds = self.data_kinds.clone();
        for kind in descriptor.data_kinds {
            kinds.register(&descriptor.id, kind)?;
        }
        self.data_kinds = kinds;
        self.tools.insert(descriptor.id, tool);
        Ok(())
    }

    /// Builder form of [`ToolRegistry::register`].
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self, ToolRegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    /// Descriptors sorted by tool id.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    pub fn data_kinds(&self) -> &DataKindRegistry {
        &self.data_kinds
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.tools.keys().collect();
        ids.sort();
        f.debug_struct("ToolRegistry")
            .field("tools", &ids)
            .field("data_kinds", &self.data_kinds.len())
            .finish()
    }
}
