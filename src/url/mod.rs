//! URL helpers: resolving, slugs for ids, and page-parameter rewriting

mod normalize;
mod paginate;

pub use normalize::{resolve, slugify};
pub use paginate::{paginate_payload, paginate_url, PAGE_BODY_KEYS, PAGE_QUERY_KEYS};
