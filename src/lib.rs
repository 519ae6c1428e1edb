use std::error::Error;

pub mod config;
pub mod convert;
pub mod error;
pub mod logger;
pub mod model;
pub mod ordering;
pub mod page_label;
pub mod readwise;
pub mod run;
pub mod store;
pub mod sync;
pub mod zotero;

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
