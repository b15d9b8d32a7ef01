//! MongoDB container support via testcontainers.

use testcontainers::Image;
use testcontainers::core::{ContainerPort, WaitFor};

/// Port MongoDB listens on inside the container.
pub const MONGO_PORT: u16 = 27017;

/// MongoDB container image.
///
/// Uses the official `mongo` image from Docker Hub.
#[derive(Debug, Clone)]
pub struct MongoContainer {
    /// Container tag (version).
    pub tag: String,
    /// Root user and password, if authentication should be enabled.
    pub root_credentials: Option<(String, String)>,
}

impl Default for MongoContainer {
    fn default() -> Self {
        Self {
            tag: "7.0".to_string(),
            root_credentials: None,
        }
    }
}

impl MongoContainer {
    /// Create a new MongoDB container configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the container tag (MongoDB version).
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Enable authentication with a root user.
    #[must_use]
    pub fn with_root_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.root_credentials = Some((user.into(), password.into()));
        self
    }

    /// Connection string for a container reachable at `host:port`.
    #[must_use]
    pub fn uri(host: &str, port: u16) -> String {
        format!("mongodb://{host}:{port}/?directConnection=true")
    }
}

impl Image for MongoContainer {
    fn name(&self) -> &str {
        "mongo"
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::message_on_stdout("Waiting for connections")]
    }

    fn env_vars(
        &self,
    ) -> impl IntoIterator<
        Item = (
            impl Into<std::borrow::Cow<'_, str>>,
            impl Into<std::borrow::Cow<'_, str>>,
        ),
    > {
        match &self.root_credentials {
            Some((user, password)) => vec![
                ("MONGO_INITDB_ROOT_USERNAME", user.as_str()),
                ("MONGO_INITDB_ROOT_PASSWORD", password.as_str()),
            ],
            None => Vec::new(),
        }
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &[ContainerPort::Tcp(MONGO_PORT)]
    }
}
