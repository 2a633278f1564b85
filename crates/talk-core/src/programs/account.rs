//! Server selection and account programs

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{agent_argument, remote_server, request_failure, with_scheme};
use crate::colors::random_hex_color;
use crate::constants::agents::{REMOTE_SERVER, USERS};
use crate::controller::Session;
use crate::http::{decode, HttpClient, HttpError};
use crate::program::{EntryOptions, Program, ProgramOutput, ProgramStep};

const NEEDS_SERVER_FOR_LOGIN: &str =
    "You must be connected to a server before you can login. Run the `set-svr` command to connect.";
const NEEDS_SERVER_FOR_REGISTER: &str =
    "You must be connected to a server before you can register. Run the `set-svr` command to connect.";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ServerInfo {
    api_host: String,
    socket_host: String,
}

#[derive(Debug, Deserialize)]
struct LoginTokens {
    user_id: String,
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Default)]
pub struct SetServer {
    prompted: bool,
}

impl SetServer {
    fn prompt() -> ProgramOutput {
        ProgramOutput::prompt(
            "Enter the server domain that you want to connect to",
            EntryOptions::labelled("Server domain").with_placeholder("chat.example.com"),
        )
    }

    async fn fetch_hosts(
        http: &dyn HttpClient,
        domain: &str,
        http_scheme: &str,
        socket_scheme: &str,
    ) -> Result<(String, String), HttpError> {
        let url = format!("{}/info", with_scheme(domain, http_scheme));
        let info: Envelope<ServerInfo> = decode(http.get_json(&url, None).await?)?;

        Ok((
            with_scheme(&info.data.api_host, http_scheme),
            with_scheme(&info.data.socket_host, socket_scheme),
        ))
    }
}

#[async_trait]
impl Program for SetServer {
    async fn step(
        &mut self,
        input: Option<String>,
        session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let Some(domain) = input.filter(|_| self.prompted) else {
            let server = match remote_server(session) {
                Ok(server) => server,
                Err(step) => return Ok(step),
            };
            if server.is_authenticated() {
                return Ok(ProgramStep::finish(
                    "You must logout before you can connect to a different server",
                ));
            }
            self.prompted = true;
            return Ok(ProgramStep::Suspended(Self::prompt()));
        };

        let domain = domain.trim();
        if domain.is_empty() {
            return Ok(ProgramStep::Suspended(Self::prompt()));
        }

        session.post_system("Fetching server metadata...");

        let http = session.http();
        let http_scheme = session.config().http_scheme();
        let socket_scheme = session.config().socket_scheme();
        let (api, socket) = match Self::fetch_hosts(http.as_ref(), domain, http_scheme, socket_scheme)
            .await
        {
            Ok(hosts) => hosts,
            Err(e) => return Ok(ProgramStep::finish(request_failure(e))),
        };

        info!(domain, api = %api, socket = %socket, "Resolved chat server");
        session
            .send_agent_command(&format!("{REMOTE_SERVER} change-server {api} {socket}"))
            .await;

        Ok(ProgramStep::finish(format!(
            "Server changed successfully:\n\nAPI host: {api}\nSocket host: {socket}"
        )))
    }
}

#[derive(Debug, Default)]
enum CredentialStage {
    #[default]
    Start,
    Username,
    Password {
        username: String,
    },
}

/// Shared username/password collection for `register` and `login`
#[derive(Debug, Default)]
struct Credentials {
    stage: CredentialStage,
    api: String,
}

enum CredentialStep {
    Prompt(ProgramStep),
    Ready { username: String, password: String },
}

impl Credentials {
    fn advance(
        &mut self,
        input: Option<String>,
        session: &Session,
        missing_server: &str,
        username_prompt: &str,
        password_prompt: &str,
    ) -> CredentialStep {
        match (std::mem::take(&mut self.stage), input) {
            (CredentialStage::Start, _) => {
                let server = match remote_server(session) {
                    Ok(server) => server,
                    Err(step) => return CredentialStep::Prompt(step),
                };
                let Some(api) = server.api_host() else {
                    return CredentialStep::Prompt(ProgramStep::finish(missing_server));
                };
                self.api = api.to_string();
                self.stage = CredentialStage::Username;
                CredentialStep::Prompt(ProgramStep::ask(
                    username_prompt,
                    EntryOptions::labelled("Username"),
                ))
            }
            (CredentialStage::Username, Some(username)) if !username.trim().is_empty() => {
                self.stage = CredentialStage::Password {
                    username: username.trim().to_string(),
                };
                CredentialStep::Prompt(ProgramStep::ask(
                    password_prompt,
                    EntryOptions::secret("Password"),
                ))
            }
            (CredentialStage::Username, _) => {
                self.stage = CredentialStage::Username;
                CredentialStep::Prompt(ProgramStep::ask(
                    username_prompt,
                    EntryOptions::labelled("Username"),
                ))
            }
            (CredentialStage::Password { username }, Some(password)) => {
                CredentialStep::Ready { username, password }
            }
            (CredentialStage::Password { username }, None) => {
                self.stage = CredentialStage::Password { username };
                CredentialStep::Prompt(ProgramStep::ask(
                    password_prompt,
                    EntryOptions::secret("Password"),
                ))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Register {
    credentials: Credentials,
}

#[async_trait]
impl Program for Register {
    async fn step(
        &mut self,
        input: Option<String>,
        session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let (username, password) = match self.credentials.advance(
            input,
            session,
            NEEDS_SERVER_FOR_REGISTER,
            "Enter a new username. Your username should consist of uppercase and lowercase letters, numbers from 0 to 9, as well as _ and - characters.",
            "Enter a new password. Your password must be at least 16 characters long.",
        ) {
            CredentialStep::Prompt(step) => return Ok(step),
            CredentialStep::Ready { username, password } => (username, password),
        };

        let url = format!("{}/register", self.credentials.api);
        let body = json!({ "username": username, "password": password });

        let http = session.http();
        Ok(match http.post_json(&url, &body, None).await {
            Ok(_) => {
                info!(username = %username, "Registered account");
                ProgramStep::finish(
                    "Registration was successful. Please use the login command to log in to your account",
                )
            }
            Err(e) => ProgramStep::finish(request_failure(e)),
        })
    }
}

#[derive(Debug, Default)]
pub struct Login {
    credentials: Credentials,
}

impl Login {
    async fn authenticate(
        http: &dyn HttpClient,
        api: &str,
        username: &str,
        password: &str,
    ) -> Result<(LoginTokens, Value), HttpError> {
        let body = json!({ "username": username, "password": password });

        let tokens: Envelope<LoginTokens> =
            decode(http.post_json(&format!("{api}/login"), &body, None).await?)?;
        let profile: Envelope<Value> = decode(
            http.get_json(&format!("{api}/profile"), Some(&tokens.data.access_token))
                .await?,
        )?;

        Ok((tokens.data, profile.data))
    }
}

#[async_trait]
impl Program for Login {
    async fn step(
        &mut self,
        input: Option<String>,
        session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let (username, password) = match self.credentials.advance(
            input,
            session,
            NEEDS_SERVER_FOR_LOGIN,
            "Enter your username",
            "Enter your password",
        ) {
            CredentialStep::Prompt(step) => return Ok(step),
            CredentialStep::Ready { username, password } => (username, password),
        };

        let http = session.http();
        let (tokens, profile) =
            match Self::authenticate(http.as_ref(), &self.credentials.api, &username, &password)
                .await
            {
                Ok(result) => result,
                Err(e) => return Ok(ProgramStep::finish(request_failure(e))),
            };

        let display_name = profile
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or(&username);
        let (user_id, display_name) = match (
            agent_argument(&tokens.user_id),
            agent_argument(display_name),
        ) {
            (Ok(user_id), Ok(display_name)) => (user_id, display_name),
            (Err(step), _) | (_, Err(step)) => return Ok(step),
        };

        info!(user_id = %tokens.user_id, "Logged in");
        session
            .send_agent_command(&format!(
                "{REMOTE_SERVER} connect {} {} {}",
                tokens.user_id, tokens.access_token, tokens.refresh_token
            ))
            .await;
        session
            .send_agent_command(&format!("{REMOTE_SERVER} set-profile --json {profile}"))
            .await;
        session
            .send_agent_command(&format!(
                "{USERS} add-user {user_id} {display_name} {}",
                random_hex_color()
            ))
            .await;

        Ok(ProgramStep::finish("Login was successful"))
    }
}
