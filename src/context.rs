/// Page type of the unit listing page
pub const UNIT_LIST_PAGE: &str = "unit_list";

/// Storage feature name for persisted filter state
pub const FILTER_FEATURE: &str = "FilterUnits";

/// Storage feature name for persisted per-unit price settings
pub const PRICES_FEATURE: &str = "Prices";

/// Per-session context shared by the engines.
///
/// Created once by the composition root and handed to each engine, so nothing
/// reaches for global tenant or page state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub tenant_id: String,
    pub page_type: String,
}

impl PageContext {
    pub fn new(tenant_id: impl Into<String>, page_type: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            page_type: page_type.into(),
        }
    }

    /// Build a storage key in the form "{tenant}/{page}/{feature}"
    pub fn storage_key(&self, feature: &str) -> String {
        format!("{}/{}/{}", self.tenant_id, self.page_type, feature)
    }
}
