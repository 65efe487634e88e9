//! Repository helpers for sqlx-backed services.
//!
//! - [`cursor`]: opaque, base-64 wrapped timestamp cursors for keyset pagination
//! - [`pagination`]: page-size clamping and `Page<T>` built from keyset queries
//! - [`services`]: the request context carrier, `with_transaction`, pool config
//!   and error types

pub mod cursor;
pub mod pagination;
pub mod services;

pub use cursor::{Cursor, CursorError, decode_cursor, encode_cursor};
pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageParams, clamp_page_size};
pub use services::config::DbConfig;
pub use services::context::{Context, TxConn, TxHandle};
pub use services::db::with_transaction;
pub use services::error::{LogErr, TxError};
