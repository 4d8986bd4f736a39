//! Keyword-based service intent detection.
//!
//! Maps free text to one of the company's service categories by substring
//! search over an ordered keyword table. The first matching keyword in table
//! order decides; a cheap heuristic, not language understanding.

use std::fmt;

/// A service line the user may be asking about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceCategory {
    WebDevelopment,
    MobileDevelopment,
    BusinessAutomation,
    ItConsulting,
}

impl ServiceCategory {
    /// Title used when talking to the model about this service.
    pub fn title(self) -> &'static str {
        match self {
            ServiceCategory::WebDevelopment => "разработка веб-приложений",
            ServiceCategory::MobileDevelopment => "разработка мобильных приложений",
            ServiceCategory::BusinessAutomation => "автоматизация бизнес-процессов",
            ServiceCategory::ItConsulting => "IT-консалтинг",
        }
    }

    /// Instruction sent to the model in place of the user's text.
    pub fn instruction_prompt(self) -> String {
        format!(
            "Пользователь интересуется услугой '{}'. Предоставь подробную информацию об этой услуге, \
             укажи примерную стоимость и сроки. Предложи дополнительные релевантные услуги.",
            self.title()
        )
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Keyword to category, in priority order. Keywords are lowercase stems.
static SERVICE_KEYWORDS: &[(&str, ServiceCategory)] = &[
    ("разработка веб", ServiceCategory::WebDevelopment),
    ("сайт", ServiceCategory::WebDevelopment),
    ("интернет-магазин", ServiceCategory::WebDevelopment),
    ("лендинг", ServiceCategory::WebDevelopment),
    ("веб-приложени", ServiceCategory::WebDevelopment),
    ("мобильн", ServiceCategory::MobileDevelopment),
    ("ios", ServiceCategory::MobileDevelopment),
    ("android", ServiceCategory::MobileDevelopment),
    ("приложени", ServiceCategory::MobileDevelopment),
    ("автоматизац", ServiceCategory::BusinessAutomation),
    ("crm", ServiceCategory::BusinessAutomation),
    ("1с", ServiceCategory::BusinessAutomation),
    ("бизнес-процесс", ServiceCategory::BusinessAutomation),
    ("консалтинг", ServiceCategory::ItConsulting),
    ("аудит", ServiceCategory::ItConsulting),
    ("стратег", ServiceCategory::ItConsulting),
    ("оптимизац", ServiceCategory::ItConsulting),
];

/// Classifies messages into service categories.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentDetector;

impl IntentDetector {
    pub fn new() -> Self {
        Self
    }

    /// The category of the first keyword (in table order) found in `text`,
    /// or `None` when no keyword matches.
    pub fn detect(&self, text: &str) -> Option<ServiceCategory> {
        let lowered = text.to_lowercase();
        SERVICE_KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(keyword, category)| {
                tracing::debug!(keyword = %keyword, category = ?category, "Service intent detected");
                *category
            })
    }
}
