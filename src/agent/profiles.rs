//! Built-in server profiles: which endpoint serves which tool set, and the
//! instructions an agent gets when that endpoint is the one that answered.

use crate::client::Endpoint;
use serde::{Deserialize, Serialize};

/// Port the people-store tool set is served on.
pub const STORE_PORT: u16 = 8000;
/// Port the news/reference tool set is served on.
pub const NEWS_PORT: u16 = 8001;
/// Path both streamed endpoints publish under.
pub const DEFAULT_PATH: &str = "/sse";
pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSetKind {
    Store,
    News,
}

const STORE_PREAMBLE: &str = "\
You are a helpful assistant with access to a database of people.
The people table has the columns id, name, age and profession.
Use these tools to work with it:

1. add_data: add a person. Takes a full SQL INSERT statement, for example
   INSERT INTO people (name, age, profession) VALUES ('Alice Smith', 25, 'Developer')

2. read_data: read from the people table. Takes a SQL SELECT statement and
   defaults to SELECT * FROM people, for example
   SELECT name, age FROM people WHERE age > 30

3. update_people: change existing records. Takes a SQL UPDATE statement, for example
   UPDATE people SET age = 27 WHERE name = 'Alice Smith'

4. delete_person: remove records. Takes a SQL DELETE statement, for example
   DELETE FROM people WHERE name = 'Alice Smith'

Always write well-formed SQL. Use these tools whenever the user asks to add,
read, update or delete information about people.";

const NEWS_PREAMBLE: &str = "\
You are an assistant with access to these tools:

1. get_wikipedia_summary: summary of a topic from Wikipedia
2. get_latest_news: current headlines from NPR or BBC
3. get_stock_news: recent headlines about a stock ticker

Use them when they help answer the user's question.";

/// A candidate endpoint together with what it means if it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    pub name: String,
    pub endpoint: Endpoint,
    pub preamble: String,
    pub kind: ToolSetKind,
}

impl ServerProfile {
    pub fn new(kind: ToolSetKind, endpoint: Endpoint) -> Self {
        let (name, preamble) = match kind {
            ToolSetKind::Store => ("people-store", STORE_PREAMBLE),
            ToolSetKind::News => ("news", NEWS_PREAMBLE),
        };
        Self {
            name: name.to_string(),
            endpoint,
            preamble: preamble.to_string(),
            kind,
        }
    }

    /// Store profile on `host:port/sse`.
    pub fn store(host: &str, port: u16) -> Self {
        Self::new(ToolSetKind::Store, Endpoint::stream(host, port, DEFAULT_PATH))
    }

    /// News profile on `host:port/sse`.
    pub fn news(host: &str, port: u16) -> Self {
        Self::new(ToolSetKind::News, Endpoint::stream(host, port, DEFAULT_PATH))
    }
}

/// Candidates probed by `chat`, in order.
pub fn default_profiles() -> Vec<ServerProfile> {
    vec![
        ServerProfile::store(DEFAULT_HOST, STORE_PORT),
        ServerProfile::news(DEFAULT_HOST, NEWS_PORT),
    ]
}
