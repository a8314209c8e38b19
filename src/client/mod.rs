//! Fetch ports and their implementations
//!
//! - `StaticPageClient`: plain HTTP GET, used for item pages
//! - `RenderedPageClient`: headless browser session, used for category listings
//!
//! Both ports are traits so runs can be driven by fakes in tests.

mod rendered_page;
mod static_page;

pub use rendered_page::{HeadlessChrome, RenderBackend, RenderedPageClient};
pub use static_page::{build_http_client, HttpPageClient, StaticPageClient};
