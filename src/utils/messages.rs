//! User-facing copy, in the site's language.

pub const POSTS_LOAD_FAILED: &str = "No se pudieron cargar los posts. Por favor, intenta más tarde.";
pub const PRODUCTS_LOAD_FAILED: &str =
    "No se pudieron cargar los productos. Por favor, intenta más tarde.";
pub const SERVICES_LOAD_FAILED: &str =
    "No se pudieron cargar los servicios. Por favor, intenta más tarde.";

pub const TITLE_REQUIRED: &str = "El título es requerido";
pub const CONTENT_REQUIRED: &str = "El contenido es requerido";
pub const DESCRIPTION_REQUIRED: &str = "La descripción es requerida";
pub const IMAGE_REQUIRED: &str = "La imagen es requerida";
pub const EDITION_URL_REQUIRED: &str = "Debe proporcionar al menos una URL (Ebook o Libro Físico)";
pub const TITLE_WITHOUT_SLUG: &str = "El título debe contener al menos una letra o número sin tilde";
pub const CATEGORY_NAME_REQUIRED: &str = "El nombre de la categoría es requerido";
pub const UNKNOWN_ICON: &str = "El ícono seleccionado no existe";

/// WhatsApp greeting pre-filled from a service page.
pub fn service_inquiry(title: &str) -> String {
    format!("Hola, me interesa el servicio de {title}. Me gustaría obtener más información.")
}

/// Subject line for an appointment request by email.
pub fn appointment_subject(title: &str) -> String {
    format!("Solicitud de cita: {title}")
}

/// Body of that appointment email.
pub fn appointment_body(title: &str) -> String {
    format!("Hola, me interesa agendar una cita para el servicio de {title}.")
}
