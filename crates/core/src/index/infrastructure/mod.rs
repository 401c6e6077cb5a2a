pub mod sqlite_span_store;
