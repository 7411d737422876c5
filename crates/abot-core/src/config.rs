use std::{env, fs, path::Path, path::PathBuf};

use crate::{access::AdminScope, domain::UserId, errors::Error, Result};

/// Typed bot configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    /// Without the leading `@`.
    pub bot_username: String,
    pub creator_id: UserId,

    pub store_path: PathBuf,
    pub backup_file_name: String,
    pub admin_scope: AdminScope,
}

impl Config {
    /// Load `.env` (if present, never overriding) and read the process env.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let bot_token = get("BOT_TOKEN").ok_or_else(|| required("BOT_TOKEN"))?;
        let bot_username = get("BOT_USERNAME")
            .map(|u| u.trim().trim_start_matches('@').to_string())
            .ok_or_else(|| required("BOT_USERNAME"))?;

        let creator_raw = get("BOT_CREATOR_ID").ok_or_else(|| required("BOT_CREATOR_ID"))?;
        let creator_id = creator_raw.trim().parse::<i64>().map(UserId).map_err(|_| {
            Error::Config(format!(
                "BOT_CREATOR_ID must be an integer user id, got {creator_raw:?}"
            ))
        })?;

        let store_path = PathBuf::from(get("BOT_STORE_PATH").unwrap_or("abot-db.json".to_string()));
        let backup_file_name =
            get("BOT_BACKUP_FILE_NAME").unwrap_or("backup.json".to_string());
        let admin_scope = parse_admin_scope(get("BOT_ADMIN_SCOPE"))?;

        Ok(Self {
            bot_token,
            bot_username,
            creator_id,
            store_path,
            backup_file_name,
            admin_scope,
        })
    }
}

fn required(key: &str) -> Error {
    Error::Config(format!("{key} environment variable is required"))
}

fn parse_admin_scope(v: Option<String>) -> Result<AdminScope> {
    let Some(v) = v else {
        return Ok(AdminScope::Global);
    };
    match v.trim().to_lowercase().as_str() {
        "global" => Ok(AdminScope::Global),
        "group" | "chat" => Ok(AdminScope::PerChat),
        other => Err(Error::Config(format!(
            "BOT_ADMIN_SCOPE must be `global` or `group`, got {other:?}"
        ))),
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // existing env wins
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }
        out.push((key.to_string(), val.to_string()));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
