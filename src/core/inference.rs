/// Descriptor inference engine
///
/// Classifies a service's database engine (Postgres or SQLite-file) by
/// querying a parsed compose document, and extracts what the drivers need:
/// container name plus credentials or file path. The Postgres path expects a
/// variable-resolved rendering (`docker compose config`); the SQLite path
/// works on the raw file with `${VAR}` values looked up in the service's
/// `.env` context.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::core::env_file::EnvFile;

/// Env keys accepted for the database name, in priority order
pub const DB_NAME_KEYS: &[&str] = &["POSTGRES_DB", "DB_NAME", "DB_DATABASE", "DB_DATABASE_NAME"];

/// Env keys accepted for the database user, in priority order
pub const DB_USER_KEYS: &[&str] = &["POSTGRES_USER", "DB_USER", "DB_USERNAME"];

/// Marker variable naming the embedded database kind (must equal "sqlite3")
pub const SQLITE_KIND_KEY: &str = "DB01_TYPE";

/// Marker variable holding the database file path inside the container
pub const SQLITE_PATH_KEY: &str = "DB01_HOST";

/// Compose file spellings found across the deployments, in lookup order
pub const COMPOSE_FILE_NAMES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// The key names inference understands, for the skip message operators see
/// when classification fails
pub fn recognized_key_synonyms() -> String {
    let mut keys: Vec<&str> = Vec::new();
    keys.extend_from_slice(DB_NAME_KEYS);
    keys.extend_from_slice(DB_USER_KEYS);
    keys.push(SQLITE_KIND_KEY);
    keys.push(SQLITE_PATH_KEY);
    keys.join(", ")
}

/// A classified database engine with everything a driver needs.
/// Construction happens only with all fields non-empty; a service that
/// cannot be fully classified never gets a descriptor at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseEngine {
    Postgres {
        container: String,
        database: String,
        user: String,
    },
    SqliteFile {
        container: String,
        file_path: String,
    },
}

impl DatabaseEngine {
    pub fn kind(&self) -> &'static str {
        match self {
            DatabaseEngine::Postgres { .. } => "postgres",
            DatabaseEngine::SqliteFile { .. } => "sqlite",
        }
    }

    pub fn container(&self) -> &str {
        match self {
            DatabaseEngine::Postgres { container, .. } => container,
            DatabaseEngine::SqliteFile { container, .. } => container,
        }
    }
}

/// One fully classified deployment unit
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub directory: PathBuf,
    pub engine: DatabaseEngine,
}

/// Partial result of scanning a descriptor for a Postgres service block
#[derive(Debug, Clone, Default)]
pub struct PostgresCandidate {
    pub service: String,
    pub container_name: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
}

impl PostgresCandidate {
    pub fn is_complete(&self) -> bool {
        self.database.as_deref().map_or(false, |s| !s.is_empty())
            && self.user.as_deref().map_or(false, |s| !s.is_empty())
    }

    /// Fall back to the service's .env context for fields the descriptor
    /// scan could not produce
    pub fn fill_from_env(&mut self, env: &EnvFile) {
        if self.database.is_none() {
            self.database = env.first_of(DB_NAME_KEYS).map(|v| v.to_string());
        }
        if self.user.is_none() {
            self.user = env.first_of(DB_USER_KEYS).map(|v| v.to_string());
        }
    }
}

/// A qualifying SQLite-file service block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteCandidate {
    pub service: String,
    pub container: String,
    pub file_path: String,
}

/// Find the compose file in a service directory, trying the spellings the
/// deployments actually use
pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
    COMPOSE_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Flatten a service's `environment` into key/value pairs. Compose allows
/// both the mapping form and the `- KEY=value` sequence form.
fn env_entries(service: &Value) -> Vec<(String, String)> {
    let mut entries = Vec::new();

    match service.get("environment") {
        Some(Value::Mapping(map)) => {
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => continue,
                    };
                    entries.push((key.to_string(), value));
                }
            }
        }
        Some(Value::Sequence(seq)) => {
            for item in seq {
                if let Some(s) = item.as_str() {
                    if let Some((k, v)) = s.split_once('=') {
                        entries.push((k.to_string(), v.to_string()));
                    }
                }
            }
        }
        _ => {}
    }

    entries
}

fn resolve_value(value: &str, env: Option<&EnvFile>) -> Option<String> {
    match env {
        Some(env) => env.resolve(value),
        None => Some(value.to_string()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Scan a compose document for service blocks whose image names a Postgres
/// build, in declaration order. Pass `env` when scanning a raw (unresolved)
/// document so `${VAR}` values get expanded; a resolved rendering needs none.
pub fn postgres_candidates(doc: &Value, env: Option<&EnvFile>) -> Vec<PostgresCandidate> {
    let mut candidates = Vec::new();

    let Some(services) = doc.get("services").and_then(|s| s.as_mapping()) else {
        return candidates;
    };

    for (key, service) in services {
        let Some(service_name) = key.as_str() else {
            continue;
        };

        let image = service.get("image").and_then(|i| i.as_str()).unwrap_or("");
        if !image.contains("postgres") {
            continue;
        }

        let container_name = service
            .get("container_name")
            .and_then(|c| c.as_str())
            .and_then(|c| non_empty(resolve_value(c, env)));

        let mut database = None;
        let mut user = None;
        for (k, v) in env_entries(service) {
            match k.as_str() {
                "POSTGRES_DB" if database.is_none() => {
                    database = non_empty(resolve_value(&v, env));
                }
                "POSTGRES_USER" if user.is_none() => {
                    user = non_empty(resolve_value(&v, env));
                }
                _ => {}
            }
        }

        candidates.push(PostgresCandidate {
            service: service_name.to_string(),
            container_name,
            database,
            user,
        });
    }

    candidates
}

/// Scan a raw compose document for SQLite-file service blocks: the kind
/// marker must resolve exactly to `sqlite3` and the path marker must be
/// non-empty. Container ref is `container_name`, falling back to the
/// service key.
pub fn sqlite_candidates(doc: &Value, env: &EnvFile) -> Vec<SqliteCandidate> {
    let mut candidates = Vec::new();

    let Some(services) = doc.get("services").and_then(|s| s.as_mapping()) else {
        return candidates;
    };

    for (key, service) in services {
        let Some(service_name) = key.as_str() else {
            continue;
        };

        let mut kind = None;
        let mut file_path = None;
        for (k, v) in env_entries(service) {
            match k.as_str() {
                SQLITE_KIND_KEY if kind.is_none() => kind = env.resolve(&v),
                SQLITE_PATH_KEY if file_path.is_none() => {
                    file_path = non_empty(env.resolve(&v));
                }
                _ => {}
            }
        }

        if kind.as_deref() != Some("sqlite3") {
            continue;
        }
        let Some(file_path) = file_path else {
            continue;
        };

        let container = service
            .get("container_name")
            .and_then(|c| c.as_str())
            .and_then(|c| non_empty(env.resolve(c)))
            .unwrap_or_else(|| service_name.to_string());

        candidates.push(SqliteCandidate {
            service: service_name.to_string(),
            container,
            file_path,
        });
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn env_from(pairs: &[(&str, &str)]) -> EnvFile {
        use std::io::Write;
        let dir = tempfile::TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join(".env")).unwrap();
        for (k, v) in pairs {
            writeln!(file, "{}={}", k, v).unwrap();
        }
        EnvFile::load(dir.path()).unwrap()
    }

    #[test]
    fn test_postgres_classification_from_resolved_descriptor() {
        let doc = parse(
            r#"
services:
  app:
    image: ghcr.io/requarks/wiki:2
  db:
    image: postgres:15-alpine
    container_name: wikijs-db
    environment:
      POSTGRES_DB: foo
      POSTGRES_USER: bar
"#,
        );

        let candidates = postgres_candidates(&doc, None);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.service, "db");
        assert_eq!(c.container_name.as_deref(), Some("wikijs-db"));
        assert_eq!(c.database.as_deref(), Some("foo"));
        assert_eq!(c.user.as_deref(), Some("bar"));
        assert!(c.is_complete());
    }

    #[test]
    fn test_postgres_sequence_environment_form() {
        let doc = parse(
            r#"
services:
  db:
    image: postgres:16
    environment:
      - POSTGRES_DB=miniflux
      - POSTGRES_USER=miniflux
"#,
        );

        let candidates = postgres_candidates(&doc, None);
        assert_eq!(candidates[0].database.as_deref(), Some("miniflux"));
        assert_eq!(candidates[0].user.as_deref(), Some("miniflux"));
    }

    #[test]
    fn test_postgres_raw_descriptor_expands_variables() {
        let doc = parse(
            r#"
services:
  db:
    image: postgres:${PG_TAG}
    container_name: gitea-db
    environment:
      POSTGRES_DB: ${DB_NAME}
      POSTGRES_USER: ${DB_USER}
"#,
        );
        let env = env_from(&[("DB_NAME", "gitea"), ("DB_USER", "gitea")]);

        let candidates = postgres_candidates(&doc, Some(&env));
        let c = &candidates[0];
        assert_eq!(c.database.as_deref(), Some("gitea"));
        assert_eq!(c.user.as_deref(), Some("gitea"));
    }

    #[test]
    fn test_postgres_unresolved_variable_leaves_field_empty() {
        let doc = parse(
            r#"
services:
  db:
    image: postgres:15
    environment:
      POSTGRES_DB: ${DB_NAME}
      POSTGRES_USER: admin
"#,
        );
        let env = env_from(&[]);

        let candidates = postgres_candidates(&doc, Some(&env));
        let c = &candidates[0];
        assert_eq!(c.database, None);
        assert_eq!(c.user.as_deref(), Some("admin"));
        assert!(!c.is_complete());
    }

    #[test]
    fn test_fill_from_env_synonyms() {
        let mut candidate = PostgresCandidate {
            service: "db".to_string(),
            container_name: None,
            database: None,
            user: None,
        };
        let env = env_from(&[("DB_DATABASE", "nextcloud"), ("DB_USERNAME", "nc")]);

        candidate.fill_from_env(&env);
        assert_eq!(candidate.database.as_deref(), Some("nextcloud"));
        assert_eq!(candidate.user.as_deref(), Some("nc"));
        assert!(candidate.is_complete());
    }

    #[test]
    fn test_no_postgres_image_no_candidate() {
        let doc = parse(
            r#"
services:
  app:
    image: lscr.io/linuxserver/freshrss:latest
"#,
        );

        assert!(postgres_candidates(&doc, None).is_empty());
    }

    #[test]
    fn test_first_postgres_block_wins() {
        let doc = parse(
            r#"
services:
  db-main:
    image: postgres:15
    environment:
      POSTGRES_DB: main
      POSTGRES_USER: main
  db-analytics:
    image: postgres:15
    environment:
      POSTGRES_DB: analytics
      POSTGRES_USER: analytics
"#,
        );

        let candidates = postgres_candidates(&doc, None);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].database.as_deref(), Some("main"));
    }

    #[test]
    fn test_sqlite_classification() {
        let doc = parse(
            r#"
services:
  app:
    image: linuxserver/app:latest
    container_name: app
    environment:
      - DB01_TYPE=sqlite3
      - DB01_HOST=/data/app.db
"#,
        );
        let env = env_from(&[]);

        let candidates = sqlite_candidates(&doc, &env);
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0],
            SqliteCandidate {
                service: "app".to_string(),
                container: "app".to_string(),
                file_path: "/data/app.db".to_string(),
            }
        );
    }

    #[test]
    fn test_sqlite_markers_expanded_from_env() {
        let doc = parse(
            r#"
services:
  app:
    image: linuxserver/app:latest
    environment:
      - DB01_TYPE=${APP_DB_TYPE}
      - DB01_HOST=${APP_DB_PATH}
"#,
        );
        let env = env_from(&[("APP_DB_TYPE", "sqlite3"), ("APP_DB_PATH", "/config/app.db")]);

        let candidates = sqlite_candidates(&doc, &env);
        assert_eq!(candidates[0].file_path, "/config/app.db");
        // No container_name declared: block name is the fallback
        assert_eq!(candidates[0].container, "app");
    }

    #[test]
    fn test_sqlite_requires_exact_kind() {
        let doc = parse(
            r#"
services:
  app:
    image: linuxserver/app:latest
    environment:
      - DB01_TYPE=mysql
      - DB01_HOST=db
"#,
        );
        let env = env_from(&[]);

        assert!(sqlite_candidates(&doc, &env).is_empty());
    }

    #[test]
    fn test_find_compose_file_spellings() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(find_compose_file(dir.path()).is_none());

        std::fs::write(dir.path().join("compose.yaml"), "services: {}\n").unwrap();
        assert_eq!(
            find_compose_file(dir.path()).unwrap(),
            dir.path().join("compose.yaml")
        );

        // The docker-compose.yml spelling takes precedence when both exist
        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        assert_eq!(
            find_compose_file(dir.path()).unwrap(),
            dir.path().join("docker-compose.yml")
        );
    }

    #[test]
    fn test_recognized_key_synonyms_listed() {
        let synonyms = recognized_key_synonyms();
        for key in ["POSTGRES_DB", "DB_USERNAME", "DB01_TYPE", "DB01_HOST"] {
            assert!(synonyms.contains(key), "missing {}", key);
        }
    }
}
