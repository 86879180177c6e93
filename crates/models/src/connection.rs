use crate::account::AccountIdentity;
use crate::ports::ServicePort;
use serde::Serialize;
use std::fmt;

/// Host every endpoint in a generated connection string points at
pub const EMULATOR_HOST: &str = "127.0.0.1";

/// Per-service endpoint URLs of a running emulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEndpoints {
    pub blob: String,
    pub queue: String,
    pub table: String,
}

impl ServiceEndpoints {
    /// Build the endpoints from the host ports the runtime mapped for blob,
    /// queue and table. The account name becomes the URL path unencoded.
    pub fn new(account_name: &str, blob_port: u16, queue_port: u16, table_port: u16) -> Self {
        ServiceEndpoints {
            blob: endpoint_url(blob_port, account_name),
            queue: endpoint_url(queue_port, account_name),
            table: endpoint_url(table_port, account_name),
        }
    }

    pub fn get(&self, service: ServicePort) -> &str {
        match service {
            ServicePort::Blob => &self.blob,
            ServicePort::Queue => &self.queue,
            ServicePort::Table => &self.table,
        }
    }
}

fn endpoint_url(host_port: u16, account_name: &str) -> String {
    format!("http://{}:{}/{}", EMULATOR_HOST, host_port, account_name)
}

/// Connection string understood by the Azure storage SDKs.
///
/// The rendered field order is fixed: protocol, account name, account key,
/// then the blob, queue and table endpoints, each terminated by `;`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    identity: AccountIdentity,
    endpoints: ServiceEndpoints,
}

impl ConnectionString {
    pub fn new(identity: AccountIdentity, endpoints: ServiceEndpoints) -> Self {
        ConnectionString {
            identity,
            endpoints,
        }
    }

    pub fn account_name(&self) -> &str {
        &self.identity.name
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DefaultEndpointsProtocol=http;AccountName={};AccountKey={};",
            self.identity.name, self.identity.key
        )?;
        for service in ServicePort::ALL {
            write!(f, "{}={};", service.endpoint_key(), self.endpoints.get(service))?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("identity", &self.identity)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
