mod content_detail;
mod content_list;
mod display;

pub use content_detail::ContentDetailView;
pub use content_list::ContentListView;
pub use display::ContentDisplay;
