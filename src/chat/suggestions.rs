//! Suggestion chips
//!
//! Starter suggestions are shown on an empty chat. Follow-up suggestions are
//! derived from the latest assistant reply by case-insensitive keyword
//! matching against topic groups checked in a fixed order; the first group
//! with a matching keyword wins.

use crate::api::Message;

/// Suggestions offered before the first message.
pub const STARTER_SUGGESTIONS: &[&str] = &[
    "Где посмотреть расписание?",
    "Стипендии и гранты",
    "Как поступить в СДУ?",
    "Контакты приемной комиссии",
    "Стоимость обучения",
    "Студенческие клубы и события",
];

/// A keyword group and the follow-ups it produces.
#[derive(Debug, Clone, Copy)]
pub struct TopicGroup {
    /// Short name, used in logs
    pub name: &'static str,
    /// Lower-case stems searched for in the reply
    pub keywords: &'static [&'static str],
    /// Follow-up suggestions offered when a keyword matches
    pub suggestions: &'static [&'static str],
}

/// Topic groups in priority order.
pub const TOPIC_GROUPS: &[TopicGroup] = &[
    TopicGroup {
        name: "schedule",
        keywords: &["расписан"],
        suggestions: &[
            "Как смотреть изменения в расписании?",
            "Что делать если расписание не отображается?",
            "Как зайти в PMS?",
        ],
    },
    TopicGroup {
        name: "scholarship",
        keywords: &["стипенд", "грант"],
        suggestions: &[
            "Какие бывают стипендии?",
            "Как подать документы на грант?",
            "Какие условия для стипендии?",
        ],
    },
    TopicGroup {
        name: "admission",
        keywords: &["поступить"],
        suggestions: &[
            "Какие документы нужны при поступлении?",
            "Какие проходные баллы?",
            "Есть ли подготовительные курсы?",
        ],
    },
];

/// Follow-ups offered when no topic group matches.
pub const DEFAULT_FOLLOW_UPS: &[&str] = &[
    "Расскажи про факультеты",
    "Сколько стоит обучение?",
    "Какая студенческая жизнь в СДУ?",
];

/// Follow-up suggestions for the conversation ending in `messages`.
///
/// Empty when there are no messages or the last one is from the user.
pub fn follow_ups(messages: &[Message]) -> &'static [&'static str] {
    let Some(last) = messages.last() else {
        return &[];
    };
    if last.is_user {
        return &[];
    }

    let text = last.content.to_lowercase();
    TOPIC_GROUPS
        .iter()
        .find(|group| group.keywords.iter().any(|k| text.contains(k)))
        .map(|group| {
            tracing::trace!(group = group.name, "Matched follow-up topic");
            group.suggestions
        })
        .unwrap_or(DEFAULT_FOLLOW_UPS)
}
