use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vitrina_db::{DataError, Row};

use crate::utils::{is_blank, messages, non_blank};

pub const SERVICES: &str = "services";

/// Icons a service card may show, stored by their Lucide component name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServiceIcon {
    #[default]
    Briefcase,
    BookOpen,
    GraduationCap,
    Lightbulb,
    MessageCircle,
    Mic,
    PenTool,
    Presentation,
    Target,
    Users,
    Video,
}

impl ServiceIcon {
    pub const ALL: [ServiceIcon; 11] = [
        ServiceIcon::Briefcase,
        ServiceIcon::BookOpen,
        ServiceIcon::GraduationCap,
        ServiceIcon::Lightbulb,
        ServiceIcon::MessageCircle,
        ServiceIcon::Mic,
        ServiceIcon::PenTool,
        ServiceIcon::Presentation,
        ServiceIcon::Target,
        ServiceIcon::Users,
        ServiceIcon::Video,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceIcon::Briefcase => "Briefcase",
            ServiceIcon::BookOpen => "BookOpen",
            ServiceIcon::GraduationCap => "GraduationCap",
            ServiceIcon::Lightbulb => "Lightbulb",
            ServiceIcon::MessageCircle => "MessageCircle",
            ServiceIcon::Mic => "Mic",
            ServiceIcon::PenTool => "PenTool",
            ServiceIcon::Presentation => "Presentation",
            ServiceIcon::Target => "Target",
            ServiceIcon::Users => "Users",
            ServiceIcon::Video => "Video",
        }
    }

    /// Lenient lookup for stored rows: unknown names render as the default.
    pub fn resolve(name: &str) -> ServiceIcon {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for ServiceIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIcon(pub String);

impl FromStr for ServiceIcon {
    type Err = UnknownIcon;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|icon| icon.as_str() == name)
            .ok_or_else(|| UnknownIcon(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub order_index: i32,
}

impl Service {
    pub fn icon(&self) -> ServiceIcon {
        ServiceIcon::resolve(&self.icon)
    }
}

/// A service as the site renders it: resolved icon plus contact copy.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDetail {
    #[serde(flatten)]
    pub service: Service,
    pub resolved_icon: ServiceIcon,
    pub contact_message: String,
    pub appointment_subject: String,
    pub appointment_body: String,
}

impl From<Service> for ServiceDetail {
    fn from(service: Service) -> Self {
        Self {
            resolved_icon: service.icon(),
            contact_message: messages::service_inquiry(&service.title),
            appointment_subject: messages::appointment_subject(&service.title),
            appointment_body: messages::appointment_body(&service.title),
            service,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub order_index: i32,
}

impl ServiceDraft {
    pub fn validate(&self) -> Result<ServiceIcon, DataError> {
        if is_blank(&self.title) {
            return Err(DataError::validation("title", messages::TITLE_REQUIRED));
        }
        if is_blank(&self.description) {
            return Err(DataError::validation("description", messages::DESCRIPTION_REQUIRED));
        }
        self.icon_choice()
    }

    fn icon_choice(&self) -> Result<ServiceIcon, DataError> {
        if is_blank(&self.icon) {
            return Ok(ServiceIcon::default());
        }
        self.icon
            .parse()
            .map_err(|_| DataError::validation("icon", messages::UNKNOWN_ICON))
    }

    /// Row for a draft that already passed `validate`.
    pub fn to_row(&self, icon: ServiceIcon) -> Row {
        let row = json!({
            "title": self.title.trim(),
            "description": self.description,
            "content": self.content,
            "icon": icon.as_str(),
            "youtube_url": non_blank(self.youtube_url.clone()),
            "order_index": self.order_index,
        });
        match row {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_names_round_trip_through_parse() {
        for icon in ServiceIcon::ALL {
            assert_eq!(icon.as_str().parse::<ServiceIcon>(), Ok(icon));
        }
        assert_eq!(
            "Rocket".parse::<ServiceIcon>(),
            Err(UnknownIcon("Rocket".into()))
        );
    }

    #[test]
    fn stored_unknown_icon_falls_back_to_briefcase() {
        let service = Service {
            id: "s1".into(),
            title: "Mentoría".into(),
            description: "d".into(),
            content: String::new(),
            icon: "Rocket".into(),
            youtube_url: None,
            order_index: 0,
        };
        assert_eq!(service.icon(), ServiceIcon::Briefcase);
    }

    #[test]
    fn draft_icon_rules() {
        let mut draft = ServiceDraft {
            title: "Conferencias".into(),
            description: "Charlas para empresas".into(),
            ..Default::default()
        };
        assert_eq!(draft.validate(), Ok(ServiceIcon::Briefcase));

        draft.icon = "Mic".into();
        assert_eq!(draft.validate(), Ok(ServiceIcon::Mic));

        draft.icon = "mic".into();
        assert_eq!(
            draft.validate(),
            Err(DataError::validation("icon", messages::UNKNOWN_ICON))
        );
    }

    #[test]
    fn detail_carries_contact_copy() {
        let detail = ServiceDetail::from(Service {
            id: "s1".into(),
            title: "Mentoría editorial".into(),
            description: "d".into(),
            content: "c".into(),
            icon: "PenTool".into(),
            youtube_url: None,
            order_index: 2,
        });
        assert_eq!(detail.resolved_icon, ServiceIcon::PenTool);
        assert_eq!(detail.appointment_subject, "Solicitud de cita: Mentoría editorial");

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["title"], "Mentoría editorial");
        assert_eq!(json["resolved_icon"], "PenTool");
        assert!(json["contact_message"]
            .as_str()
            .unwrap()
            .contains("servicio de Mentoría editorial"));
    }
}
