/// Starter questions offered while the conversation is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionTopic {
    pub title: &'static str,
    pub questions: [&'static str; 3],
}

pub const SUGGESTION_TOPICS: [SuggestionTopic; 3] = [
    SuggestionTopic {
        title: "תלוש השכר שלי",
        questions: [
            "מה המשמעות של ניכויים בתלוש?",
            "איך מחושבות שעות נוספות?",
            "האם התשלום על חופשה שלי תקין?",
        ],
    },
    SuggestionTopic {
        title: "זכויות עובדים",
        questions: [
            "כמה ימי חופשה מגיעים לי בשנה?",
            "מהן הזכויות שלי לגבי דמי הבראה?",
            "איך מחושבים דמי מחלה?",
        ],
    },
    SuggestionTopic {
        title: "תהליכים וטפסים",
        questions: [
            "איך אני מגיש בקשה לשעות נוספות?",
            "איך אוכל לעדכן את פרטי חשבון הבנק שלי?",
            "אילו טפסים נדרשים להחזר הוצאות?",
        ],
    },
];

/// Iterates questions with their 1-based selection number.
pub fn numbered() -> impl Iterator<Item = (usize, &'static str)> {
    SUGGESTION_TOPICS
        .iter()
        .flat_map(|topic| topic.questions.iter().copied())
        .enumerate()
        .map(|(index, question)| (index + 1, question))
}

pub fn by_number(number: usize) -> Option<&'static str> {
    numbered().find(|(candidate, _)| *candidate == number).map(|(_, question)| question)
}

pub fn render() -> String {
    let mut out = String::new();
    let mut number = 1;
    for topic in &SUGGESTION_TOPICS {
        out.push_str(&format!("{}\n", topic.title));
        for question in topic.questions {
            out.push_str(&format!("  [{number}] {question}\n"));
            number += 1;
        }
    }
    out
}
