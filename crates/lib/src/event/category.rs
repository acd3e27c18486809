//! Event categories and the priority-ordered classifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::MessagingEvent;

/// Webhook subscription field an event belongs to. Wire names match the platform's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    MessageEchoes,
    Messages,
    MessageDeliveries,
    MessageReads,
    MessagingAccountLinking,
    MessagingHandovers,
    MessagingOptins,
    MessagingPolicyEnforcement,
    MessagingPostbacks,
    MessagingReferrals,
    /// Reserved; never produced by classification.
    MessagingPayments,
    /// Reserved; never produced by classification.
    MessagingPreCheckouts,
    /// Reserved; never produced by classification.
    Standby,
    #[default]
    Unknown,
}

impl EventCategory {
    pub const ALL: [EventCategory; 14] = [
        EventCategory::MessageEchoes,
        EventCategory::Messages,
        EventCategory::MessageDeliveries,
        EventCategory::MessageReads,
        EventCategory::MessagingAccountLinking,
        EventCategory::MessagingHandovers,
        EventCategory::MessagingOptins,
        EventCategory::MessagingPolicyEnforcement,
        EventCategory::MessagingPostbacks,
        EventCategory::MessagingReferrals,
        EventCategory::MessagingPayments,
        EventCategory::MessagingPreCheckouts,
        EventCategory::Standby,
        EventCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::MessageEchoes => "message_echoes",
            EventCategory::Messages => "messages",
            EventCategory::MessageDeliveries => "message_deliveries",
            EventCategory::MessageReads => "message_reads",
            EventCategory::MessagingAccountLinking => "messaging_account_linking",
            EventCategory::MessagingHandovers => "messaging_handovers",
            EventCategory::MessagingOptins => "messaging_optins",
            EventCategory::MessagingPolicyEnforcement => "messaging_policy_enforcement",
            EventCategory::MessagingPostbacks => "messaging_postbacks",
            EventCategory::MessagingReferrals => "messaging_referrals",
            EventCategory::MessagingPayments => "messaging_payments",
            EventCategory::MessagingPreCheckouts => "messaging_pre_checkouts",
            EventCategory::Standby => "standby",
            EventCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for EventCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

impl MessagingEvent {
    /// Category for this event; first populated sub-payload in priority order wins.
    ///
    /// An opt-in does not stop evaluation: a later enforcement, postback or referral
    /// match replaces it. Existing deployments depend on this ordering.
    pub fn classify(&self) -> EventCategory {
        if let Some(m) = &self.message {
            if m.is_echo {
                return EventCategory::MessageEchoes;
            }
            if !m.mid.is_empty() {
                return EventCategory::Messages;
            }
        }
        if self.delivery.as_ref().is_some_and(|d| d.watermark != 0) {
            return EventCategory::MessageDeliveries;
        }
        if self.read.as_ref().is_some_and(|r| r.watermark != 0) {
            return EventCategory::MessageReads;
        }
        if self
            .account_linking
            .as_ref()
            .is_some_and(|a| !a.status.is_empty())
        {
            return EventCategory::MessagingAccountLinking;
        }
        if self
            .handover
            .as_ref()
            .is_some_and(|h| !h.new_owner_app_id.is_empty())
        {
            return EventCategory::MessagingHandovers;
        }

        let mut category = EventCategory::Unknown;
        if self.optin.as_ref().is_some_and(|o| !o.reference.is_empty()) {
            category = EventCategory::MessagingOptins;
        }
        if self
            .policy_enforcement
            .as_ref()
            .is_some_and(|p| !p.reason.is_empty())
        {
            return EventCategory::MessagingPolicyEnforcement;
        }
        if self.postback.as_ref().is_some_and(|p| !p.title.is_empty()) {
            return EventCategory::MessagingPostbacks;
        }
        if self.referral.as_ref().is_some_and(|r| !r.source.is_empty()) {
            return EventCategory::MessagingReferrals;
        }
        category
    }

    /// Classify and store the result in `category`.
    pub fn assign_category(&mut self) -> EventCategory {
        self.category = self.classify();
        self.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        AccountLinking, Delivery, Handover, Message, Optin, PolicyEnforcement, Postback, Read,
        Referral,
    };

    fn message(mid: &str, is_echo: bool) -> Message {
        Message {
            mid: mid.to_string(),
            is_echo,
            ..Message::default()
        }
    }

    #[test]
    fn message_with_mid_is_messages() {
        let event = MessagingEvent {
            message: Some(message("mid.1", false)),
            ..MessagingEvent::default()
        };
        assert_eq!(event.classify(), EventCategory::Messages);
    }

    #[test]
    fn echo_wins_over_mid() {
        let event = MessagingEvent {
            message: Some(message("mid.1", true)),
            ..MessagingEvent::default()
        };
        assert_eq!(event.classify(), EventCategory::MessageEchoes);
    }

    #[test]
    fn empty_message_falls_through() {
        let event = MessagingEvent {
            message: Some(message("", false)),
            read: Some(Read {
                watermark: 10,
                seq: 0,
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(event.classify(), EventCategory::MessageReads);
    }

    #[test]
    fn receipts_need_nonzero_watermark() {
        let zero = MessagingEvent {
            delivery: Some(Delivery::default()),
            ..MessagingEvent::default()
        };
        assert_eq!(zero.classify(), EventCategory::Unknown);

        let delivered = MessagingEvent {
            delivery: Some(Delivery {
                mids: vec!["mid.1".into()],
                watermark: 1458668856253,
                seq: 37,
            }),
            read: Some(Read {
                watermark: 1,
                seq: 0,
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(delivered.classify(), EventCategory::MessageDeliveries);
    }

    #[test]
    fn account_linking_and_handover() {
        let linked = MessagingEvent {
            account_linking: Some(AccountLinking {
                status: "linked".into(),
                authorization_code: None,
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(linked.classify(), EventCategory::MessagingAccountLinking);

        let handover = MessagingEvent {
            handover: Some(Handover {
                new_owner_app_id: "123".into(),
                metadata: None,
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(handover.classify(), EventCategory::MessagingHandovers);
    }

    #[test]
    fn optin_alone() {
        let event = MessagingEvent {
            optin: Some(Optin {
                reference: "PASS_THROUGH".into(),
                user_ref: None,
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(event.classify(), EventCategory::MessagingOptins);
    }

    #[test]
    fn optin_is_overridden_by_later_matches() {
        let optin = Some(Optin {
            reference: "r".into(),
            user_ref: None,
        });
        let with_postback = MessagingEvent {
            optin: optin.clone(),
            postback: Some(Postback {
                title: "Push Me".into(),
                ..Postback::default()
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(with_postback.classify(), EventCategory::MessagingPostbacks);

        let with_enforcement = MessagingEvent {
            optin: optin.clone(),
            policy_enforcement: Some(PolicyEnforcement {
                action: Some("block".into()),
                reason: "spam".into(),
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(
            with_enforcement.classify(),
            EventCategory::MessagingPolicyEnforcement
        );

        let with_referral = MessagingEvent {
            optin,
            referral: Some(Referral {
                source: "SHORTLINK".into(),
                ..Referral::default()
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(with_referral.classify(), EventCategory::MessagingReferrals);
    }

    #[test]
    fn postback_without_title_is_unknown() {
        let event = MessagingEvent {
            postback: Some(Postback {
                payload: "p".into(),
                ..Postback::default()
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(event.classify(), EventCategory::Unknown);
    }

    #[test]
    fn nothing_populated_is_unknown() {
        assert_eq!(MessagingEvent::default().classify(), EventCategory::Unknown);
    }

    #[test]
    fn assign_category_stores_result() {
        let mut event = MessagingEvent {
            referral: Some(Referral {
                reference: "r".into(),
                source: "ADS".into(),
                kind: "OPEN_THREAD".into(),
            }),
            ..MessagingEvent::default()
        };
        assert_eq!(event.assign_category(), EventCategory::MessagingReferrals);
        assert_eq!(event.category, EventCategory::MessagingReferrals);
    }

    #[test]
    fn names_parse_back() {
        for c in EventCategory::ALL {
            assert_eq!(c.as_str().parse::<EventCategory>(), Ok(c));
            assert_eq!(
                serde_json::to_value(c).unwrap(),
                serde_json::Value::String(c.to_string())
            );
        }
        assert_eq!(
            "payments".parse::<EventCategory>(),
            Err(ParseCategoryError("payments".into()))
        );
    }
}
