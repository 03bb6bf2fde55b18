//! Captured submission history and its panel

mod panel;
mod store;
mod view;

pub use panel::{is_truthy_flag, PanelState};
pub use store::HistoryStore;
pub use view::HistoryView;
