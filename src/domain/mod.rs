mod contact;
mod email;
mod email_address;
mod placeholder;
mod plan;
mod recipient;
mod reference;
mod template;
mod thread_id;

// allow external `use` statements to skip the per-type submodules
pub use contact::Contact;
pub use email::Email;
pub use email::EmailEntry;
pub use email::EmailMetadata;
pub use email::EmailStatus;
pub use email::EntityData;
pub use email_address::EmailAddress;
pub use placeholder::is_balanced;
pub use placeholder::PlaceholderStore;
pub use placeholder::PlaceholderValue;
pub use plan::FollowUpPlan;
pub use plan::FollowUpStep;
pub use plan::PlanType;
pub use plan::PlanWithTemplate;
pub use recipient::Recipient;
pub use recipient::RecipientMetadata;
pub use reference::SpreadsheetReference;
pub use template::deserialize_placeholders;
pub use template::serialize_placeholders;
pub use template::Template;
pub use template::TemplateType;
pub use thread_id::ThreadId;
