mod comment;
pub use comment::Comment;

mod graph;
pub use graph::ReferenceGraph;

pub mod quote;
pub mod resolve;

mod session;
pub use session::{RefreshReport, Session};

mod state;
pub use state::{StateManager, SubscriptionId};

mod view;
pub use view::{SelectedQuote, View, ViewItem, ViewQuery};

mod fuzz;
mod testing;

pub mod api {
    pub use crosstalk_api::*;
}
