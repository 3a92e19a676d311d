mod dispatch;
mod ingestion;
mod scheduling;
mod selector;
mod support;
