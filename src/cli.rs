// Command-line surface over a single store instance

use crate::core::state::AuthState;
use crate::models::user::{Role, User, UserStatus, UserUpdate};
use crate::persist::persister::Persister;
use crate::stores::auth_store::AuthStore;
use crate::utils::time::today;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::PathBuf;

pub const USAGE: &str = "\
usage: pointstore [--config <path>] <command> [args...]

commands:
  show                                      print the whole state
  login <id>                                sign in as an existing user
  logout                                    sign out
  get <id>                                  print one user (null if unknown)
  points <n>                                set current user's balance to n
  user-points <id> <n>                      set any user's balance to n
  profile <field>=<value>...                update current user (loginId, name, email, role, status)
  avatar <url>                              set current user's avatar
  icon <base64>                             set the custom icon
  register <id> <loginId> <name> <email> <role>
  reset                                     delete persisted state";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Show,
    Login { user_id: String },
    Logout,
    Get { user_id: String },
    Points { points: i64 },
    UserPoints { user_id: String, points: i64 },
    Profile { update: UserUpdate },
    Avatar { url: String },
    Icon { base64: String },
    Register { user: User },
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

/// Parse arguments, excluding the program name
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config_path = None;
    let mut rest = args;

    if let Some(first) = rest.first() {
        if first == "--config" || first == "-c" {
            let Some(path) = rest.get(1) else {
                bail!("--config requires a path");
            };
            config_path = Some(PathBuf::from(path));
            rest = &rest[2..];
        }
    }

    let Some((name, params)) = rest.split_first() else {
        bail!("missing command");
    };

    let command = parse_command(name, params)?;

    Ok(Invocation {
        config_path,
        command,
    })
}

fn parse_command(name: &str, params: &[String]) -> Result<Command> {
    let command = match (name, params) {
        ("show", []) => Command::Show,
        ("login", [user_id]) => Command::Login {
            user_id: user_id.clone(),
        },
        ("logout", []) => Command::Logout,
        ("get", [user_id]) => Command::Get {
            user_id: user_id.clone(),
        },
        ("points", [points]) => Command::Points {
            points: parse_points(points)?,
        },
        ("user-points", [user_id, points]) => Command::UserPoints {
            user_id: user_id.clone(),
            points: parse_points(points)?,
        },
        ("profile", fields) if !fields.is_empty() => Command::Profile {
            update: parse_profile(fields)?,
        },
        ("avatar", [url]) => Command::Avatar { url: url.clone() },
        ("icon", [base64]) => Command::Icon {
            base64: base64.clone(),
        },
        ("register", [id, login_id, name, email, role]) => {
            let role = role.parse::<Role>().map_err(anyhow::Error::msg)?;
            Command::Register {
                user: User::new(
                    id.as_str(),
                    login_id.as_str(),
                    name.as_str(),
                    email.as_str(),
                    role,
                    today(),
                ),
            }
        }
        ("reset", []) => Command::Reset,
        (other, _) => bail!("unknown command or wrong arguments: {}", other),
    };
    Ok(command)
}

fn parse_points(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .context(format!("Invalid point value '{}'", raw))
}

fn parse_profile(fields: &[String]) -> Result<UserUpdate> {
    let mut update = UserUpdate::default();

    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            bail!("expected <field>=<value>, got '{}'", field);
        };

        match key {
            "loginId" => update.login_id = Some(value.to_string()),
            "name" => update.name = Some(value.to_string()),
            "email" => update.email = Some(value.to_string()),
            "role" => update.role = Some(value.parse::<Role>().map_err(anyhow::Error::msg)?),
            "status" => {
                update.status = Some(value.parse::<UserStatus>().map_err(anyhow::Error::msg)?)
            }
            other => bail!("unknown profile field '{}'", other),
        }
    }

    Ok(update)
}

fn ensure_total_fits(user: &User, points: i64) -> Result<()> {
    if user.total_earned.checked_add(points).is_none() {
        bail!(
            "adding {} to totalEarned {} of user {} would overflow",
            points,
            user.total_earned,
            user.id
        );
    }
    Ok(())
}

/// Apply `command` to `store` and return what should be printed.
/// Changes reach storage through whatever the persister attached.
pub fn run(command: Command, store: &mut AuthStore, persister: &Persister) -> Result<Value> {
    let output = match command {
        Command::Show => serde_json::to_value(store.state())?,
        Command::Login { user_id } => serde_json::to_value(store.login(&user_id)?)?,
        Command::Logout => {
            store.logout();
            serde_json::to_value(store.state())?
        }
        Command::Get { user_id } => serde_json::to_value(store.get_user(&user_id))?,
        Command::Points { points } => {
            let Some(user) = store.current_user() else {
                bail!("no user is logged in");
            };
            ensure_total_fits(user, points)?;
            store.update_points(points);
            serde_json::to_value(store.current_user())?
        }
        Command::UserPoints { user_id, points } => {
            let Some(user) = store.get_user(&user_id) else {
                bail!("unknown user: {}", user_id);
            };
            ensure_total_fits(user, points)?;
            store.update_user_points(&user_id, points);
            serde_json::to_value(store.get_user(&user_id))?
        }
        Command::Profile { update } => {
            if store.current_user().is_none() {
                bail!("no user is logged in");
            }
            store.update_profile(&update);
            serde_json::to_value(store.current_user())?
        }
        Command::Avatar { url } => {
            if store.current_user().is_none() {
                bail!("no user is logged in");
            }
            store.update_avatar(url);
            serde_json::to_value(store.current_user())?
        }
        Command::Icon { base64 } => {
            store.update_icon(base64);
            serde_json::to_value(store.state())?
        }
        Command::Register { user } => {
            let user_id = user.id.clone();
            store.register_user(user)?;
            serde_json::to_value(store.get_user(&user_id))?
        }
        Command::Reset => {
            persister.clear_storage()?;
            store.replace_state(AuthState::new());
            serde_json::to_value(store.state())?
        }
    };
    Ok(output)
}
