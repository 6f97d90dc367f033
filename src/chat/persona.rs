use serde::{Deserialize, Serialize};

/// Identity facts of the blog, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub blog_name: String,
    pub blog_writer: String,
    pub blog_url: String,
    pub contact_info: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            blog_name: "TechNibbana".to_string(),
            blog_writer: "Nitesh Sinha".to_string(),
            blog_url: "https://technibbana.wordpress.com/".to_string(),
            contact_info: "nitesh@technibbana.com".to_string(),
        }
    }
}
