use crate::xmlrpc::custom::CustomTypeRegistry;
use crate::xmlrpc::date::{DateFormatter, DateFormatterOptions};

const DEFAULT_HEADERS: [(&str, &str); 2] = [("Content-Type", "text/xml"), ("Accept", "text/xml")];

/// Everything a `Client` needs besides its transport.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub url: String,
    pub encoding: Option<String>,
    pub headers: Vec<(String, String)>,
    pub date_options: DateFormatterOptions,
    pub custom_types: CustomTypeRegistry,
}

impl ClientConfig {
    pub fn new(url: &str) -> ClientConfig {
        ClientConfig {
            url: url.to_string(),
            encoding: None,
            headers: DEFAULT_HEADERS
                .iter()
                .map(|&(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            date_options: DateFormatterOptions::default(),
            custom_types: CustomTypeRegistry::new(),
        }
    }

    /// Label written into the XML declaration.
    pub fn encoding(mut self, encoding: &str) -> ClientConfig {
        self.encoding = Some(encoding.to_string());
        self
    }

    /// Adds a header, replacing any existing one of the same name.
    pub fn header(mut self, name: &str, value: &str) -> ClientConfig {
        self.headers.retain(|&(ref n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn date_options(mut self, options: DateFormatterOptions) -> ClientConfig {
        self.date_options = options;
        self
    }

    pub fn custom_types(mut self, registry: CustomTypeRegistry) -> ClientConfig {
        self.custom_types = registry;
        self
    }

    pub fn date_formatter(&self) -> DateFormatter {
        DateFormatter::new(self.date_options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers() {
        let config = ClientConfig::new("http://localhost/RPC2");
        assert_eq!(config.headers.len(), 2);
        assert!(config.headers.contains(&("Content-Type".to_string(), "text/xml".to_string())));
        assert!(config.encoding.is_none());
    }

    #[test]
    fn test_header_override() {
        let config = ClientConfig::new("http://localhost/RPC2")
            .header("content-type", "text/xml; charset=utf-8")
            .header("Authorization", "Basic dXNlcjoxMjM=")
            .encoding("utf-8");

        assert_eq!(
            config.headers,
            vec![
                ("Accept".to_string(), "text/xml".to_string()),
                ("content-type".to_string(), "text/xml; charset=utf-8".to_string()),
                ("Authorization".to_string(), "Basic dXNlcjoxMjM=".to_string()),
            ]
        );
        assert_eq!(config.encoding.as_deref(), Some("utf-8"));
    }
}
