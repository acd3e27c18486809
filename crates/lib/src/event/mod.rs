//! Messenger webhook event model and classification.
//!
//! Payloads are decoded into [`IncomingEvent`]; each [`MessagingEvent`] is then
//! classified into an [`EventCategory`] based on which sub-payload is populated.

mod category;
mod model;

pub use category::{EventCategory, ParseCategoryError};
pub use model::{
    AccountLinking, Attachment, AttachmentPayload, Coordinates, Delivery, Entry, Handover,
    IncomingEvent, Message, MessagingEvent, Optin, Participant, PolicyEnforcement, Postback,
    QuickReply, Read, Referral,
};
