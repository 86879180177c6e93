use std::fmt;

/// Container port the blob service listens on inside the Azurite image
pub const BLOB_PORT: u16 = 10000;
/// Container port the queue service listens on inside the Azurite image
pub const QUEUE_PORT: u16 = 10001;
/// Container port the table service listens on inside the Azurite image
pub const TABLE_PORT: u16 = 10002;

/// One of the three storage services the emulator serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServicePort {
    Blob,
    Queue,
    Table,
}

impl ServicePort {
    /// Every service, in connection string order
    pub const ALL: [ServicePort; 3] = [ServicePort::Blob, ServicePort::Queue, ServicePort::Table];

    pub fn container_port(&self) -> u16 {
        match self {
            ServicePort::Blob => BLOB_PORT,
            ServicePort::Queue => QUEUE_PORT,
            ServicePort::Table => TABLE_PORT,
        }
    }

    /// Key of this service's endpoint inside a connection string
    pub fn endpoint_key(&self) -> &'static str {
        match self {
            ServicePort::Blob => "BlobEndpoint",
            ServicePort::Queue => "QueueEndpoint",
            ServicePort::Table => "TableEndpoint",
        }
    }

    /// Capitalised name as printed by Azurite when the service is up
    pub fn display_name(&self) -> &'static str {
        match self {
            ServicePort::Blob => "Blob",
            ServicePort::Queue => "Queue",
            ServicePort::Table => "Table",
        }
    }
}

impl fmt::Display for ServicePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.container_port())
    }
}
