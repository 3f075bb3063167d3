//! ProviderRegistry - static, ordered list of available wallets.
//!
//! Construction has no side effects: no wallet is queried until a descriptor's
//! `connect` runs. Registration order is display order only.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::{Capabilities, Capability, WalletProvider};

/// Immutable snapshot of a registered wallet plus the handle to drive it.
#[derive(Clone)]
pub struct ProviderDescriptor {
    name: String,
    icon: Option<String>,
    url: Option<String>,
    capabilities: Capabilities,
    provider: Arc<dyn WalletProvider>,
}

impl ProviderDescriptor {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            name: provider.name().to_string(),
            icon: provider.icon().map(str::to_string),
            url: provider.url().map(str::to_string),
            capabilities: provider.capabilities(),
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.supports(capability)
    }
    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }

    /// Serializable view for listings.
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            icon: self.icon.clone(),
            url: self.url.clone(),
            capabilities: self.capabilities,
        }
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub icon: Option<String>,
    pub url: Option<String>,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Build from providers in priority order. Later duplicates of a name are dropped.
    pub fn new(providers: impl IntoIterator<Item = Arc<dyn WalletProvider>>) -> Self {
        let mut registry = Self::default();
        for provider in providers {
            registry.push(provider);
        }
        registry
    }

    pub fn with(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.push(provider);
        self
    }

    fn push(&mut self, provider: Arc<dyn WalletProvider>) {
        let descriptor = ProviderDescriptor::new(provider);
        if self.find(descriptor.name()).is_some() {
            tracing::warn!("duplicate wallet '{}' ignored", descriptor.name());
            return;
        }
        self.providers.push(descriptor);
    }

    pub fn list(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn find(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
