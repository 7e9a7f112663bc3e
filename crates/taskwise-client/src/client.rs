use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use taskwise_core::attachment::{AttachmentType, LinkAttachmentInput};
use taskwise_core::comment::CreateComment;
use taskwise_core::journal::{
    CreateJournalNote, JournalDaySummary, UpdateJournalNote, UpdateMood,
};
use taskwise_core::resource::{
    ActivityResource, CommentResource, Envelope, JournalDayResource, JournalNoteResource,
    LoginResponse, MessageResponse, Paginated, TaskAttachmentResource, TaskResource,
    UserResource,
};
use taskwise_core::statistics::{Statistics, StatisticsQuery};
use taskwise_core::task::{CreateTask, TaskFilter, TaskProgressUpdate, UpdateTask};
use taskwise_core::user::{
    CreateUser, Credentials, UpdatePassword, UpdateProfile, UpdateUser, UserQuery,
};

use crate::{ClientConfig, ClientError, TokenStore, UploadFile, AUTH_TOKEN_KEY};

/// One async method per API endpoint. Cheap to clone; clones share the
/// connection pool and token store.
#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    client: Client,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn store_token(&self, token: &str) -> Result<(), ClientError> {
        self.tokens.set(AUTH_TOKEN_KEY, token).await
    }

    pub async fn clear_token(&self) -> Result<(), ClientError> {
        self.tokens.remove(AUTH_TOKEN_KEY).await
    }

    /// Start a request, attaching the stored bearer token when there is one.
    async fn prepare(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = format!("{}{path}", self.config.base_url);
        debug!(%method, %url, "api request");
        let builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");
        match self.tokens.get(AUTH_TOKEN_KEY).await? {
            Some(token) if !token.is_empty() => Ok(builder.bearer_auth(token)),
            _ => Ok(builder),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.prepare(Method::GET, path).await?.send().await?;
        handle_response(resp).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .prepare(method, path)
            .await?
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    async fn send_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ClientError> {
        let resp = self
            .prepare(Method::POST, path)
            .await?
            .multipart(form)
            .send()
            .await?;
        handle_response(resp).await
    }

    async fn delete_req(&self, path: &str) -> Result<(), ClientError> {
        let resp = self.prepare(Method::DELETE, path).await?.send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::from_status(status, resp.text().await?))
        }
    }

    // -- Health --

    /// Unauthenticated liveness probe.
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let _: Value = self.get_json("/health").await?;
        Ok(())
    }

    // -- Auth & profile --

    /// Exchange credentials for a token. Persisting it is up to the caller;
    /// see [`ApiClient::store_token`].
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ClientError> {
        self.send_json(Method::POST, "/login", credentials).await
    }

    pub async fn get_user(&self) -> Result<UserResource, ClientError> {
        into_data(self.get_json("/v1/user").await)
    }

    pub async fn update_profile_info(
        &self,
        input: &UpdateProfile,
    ) -> Result<UserResource, ClientError> {
        into_data(self.send_json(Method::PUT, "/v1/user/profile", input).await)
    }

    pub async fn update_password(
        &self,
        input: &UpdatePassword,
    ) -> Result<MessageResponse, ClientError> {
        self.send_json(Method::PUT, "/v1/user/password", input).await
    }

    pub async fn upload_profile_photo(
        &self,
        photo: UploadFile,
    ) -> Result<UserResource, ClientError> {
        let form = Form::new().part("photo", file_part(photo)?);
        into_data(self.send_form("/v1/user/photo", form).await)
    }

    // -- Users --

    /// Without `page` the server returns every employee and `meta` is absent.
    pub async fn get_users(
        &self,
        query: &UserQuery,
    ) -> Result<Paginated<UserResource>, ClientError> {
        self.get_json(&users_path(query)?).await
    }

    pub async fn create_user(&self, input: &CreateUser) -> Result<UserResource, ClientError> {
        into_data(self.send_json(Method::POST, "/v1/users", input).await)
    }

    pub async fn update_user(
        &self,
        id: i64,
        input: &UpdateUser,
    ) -> Result<UserResource, ClientError> {
        into_data(
            self.send_json(Method::PUT, &format!("/v1/users/{id}"), input)
                .await,
        )
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ClientError> {
        self.delete_req(&format!("/v1/users/{id}")).await
    }

    // -- Tasks --

    pub async fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<TaskResource>, ClientError> {
        into_data(self.get_json(&with_query("/v1/tasks", filter)?).await)
    }

    pub async fn get_task(&self, id: i64) -> Result<TaskResource, ClientError> {
        into_data(self.get_json(&format!("/v1/tasks/{id}")).await)
    }

    pub async fn create_task(&self, input: &CreateTask) -> Result<TaskResource, ClientError> {
        into_data(self.send_json(Method::POST, "/v1/tasks", input).await)
    }

    pub async fn update_task(
        &self,
        id: i64,
        input: &UpdateTask,
    ) -> Result<TaskResource, ClientError> {
        into_data(
            self.send_json(Method::PUT, &format!("/v1/tasks/{id}"), input)
                .await,
        )
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ClientError> {
        self.delete_req(&format!("/v1/tasks/{id}")).await
    }

    pub async fn get_task_activities(
        &self,
        id: i64,
    ) -> Result<Vec<ActivityResource>, ClientError> {
        into_data(self.get_json(&format!("/v1/tasks/{id}/activities")).await)
    }

    pub async fn post_task_update(
        &self,
        id: i64,
        update: &TaskProgressUpdate,
    ) -> Result<TaskResource, ClientError> {
        into_data(
            self.send_json(Method::POST, &format!("/v1/tasks/{id}/updates"), update)
                .await,
        )
    }

    // -- Attachments --

    pub async fn list_attachments(
        &self,
        task_id: i64,
    ) -> Result<Vec<TaskAttachmentResource>, ClientError> {
        into_data(
            self.get_json(&format!("/v1/tasks/{task_id}/attachments"))
                .await,
        )
    }

    /// Upload a file; `attachment_type` is `image` for `image/*` content.
    pub async fn upload_attachment(
        &self,
        task_id: i64,
        file: UploadFile,
    ) -> Result<TaskAttachmentResource, ClientError> {
        let form = Form::new()
            .text("attachment_type", file.attachment_type().as_str())
            .part("file", file_part(file)?);
        into_data(
            self.send_form(&format!("/v1/tasks/{task_id}/attachments"), form)
                .await,
        )
    }

    pub async fn add_link_attachment(
        &self,
        task_id: i64,
        url: &str,
    ) -> Result<TaskAttachmentResource, ClientError> {
        let body = LinkAttachmentInput {
            attachment_type: AttachmentType::Link,
            url: url.to_string(),
        };
        into_data(
            self.send_json(
                Method::POST,
                &format!("/v1/tasks/{task_id}/attachments"),
                &body,
            )
            .await,
        )
    }

    pub async fn delete_attachment(&self, id: i64) -> Result<(), ClientError> {
        self.delete_req(&format!("/v1/attachments/{id}")).await
    }

    // -- Comments --

    pub async fn get_task_comments(
        &self,
        task_id: i64,
    ) -> Result<Vec<CommentResource>, ClientError> {
        into_data(self.get_json(&format!("/v1/tasks/{task_id}/comments")).await)
    }

    pub async fn post_task_comment(
        &self,
        task_id: i64,
        input: &CreateComment,
    ) -> Result<CommentResource, ClientError> {
        into_data(
            self.send_json(
                Method::POST,
                &format!("/v1/tasks/{task_id}/comments"),
                input,
            )
            .await,
        )
    }

    // -- Journal --

    pub async fn get_journal_month_data(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<JournalDaySummary>, ClientError> {
        into_data(
            self.get_json(&format!("/v1/journals/month/{year}/{month}"))
                .await,
        )
    }

    pub async fn get_journal_day_details(
        &self,
        date: NaiveDate,
    ) -> Result<JournalDayResource, ClientError> {
        into_data(
            self.get_json(&format!("/v1/journals/day/{}", date.format("%Y-%m-%d")))
                .await,
        )
    }

    pub async fn update_journal_mood(
        &self,
        input: &UpdateMood,
    ) -> Result<JournalDayResource, ClientError> {
        into_data(self.send_json(Method::POST, "/v1/journals/mood", input).await)
    }

    pub async fn add_journal_note(
        &self,
        input: &CreateJournalNote,
    ) -> Result<JournalNoteResource, ClientError> {
        into_data(self.send_json(Method::POST, "/v1/journals/notes", input).await)
    }

    pub async fn update_journal_note(
        &self,
        id: i64,
        input: &UpdateJournalNote,
    ) -> Result<JournalNoteResource, ClientError> {
        into_data(
            self.send_json(Method::PUT, &format!("/v1/journals/notes/{id}"), input)
                .await,
        )
    }

    pub async fn delete_journal_note(&self, id: i64) -> Result<(), ClientError> {
        self.delete_req(&format!("/v1/journals/notes/{id}")).await
    }

    // -- Statistics --

    pub async fn get_statistics(&self, query: &StatisticsQuery) -> Result<Statistics, ClientError> {
        into_data(self.get_json(&with_query("/v1/statistics", query)?).await)
    }
}

fn into_data<T>(result: Result<Envelope<T>, ClientError>) -> Result<T, ClientError> {
    result.map(|envelope| envelope.data)
}

async fn handle_response<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ClientError::from_status(status, body));
    }
    serde_json::from_str(&body).map_err(|e| ClientError::Decode(format!("{e}: {body}")))
}

fn file_part(file: UploadFile) -> Result<Part, ClientError> {
    Ok(Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(&file.content_type)?)
}

/// Encode the non-null fields of a query struct as `k=v&...`.
fn query_string<T: Serialize>(query: &T) -> Result<String, ClientError> {
    let value = serde_json::to_value(query).map_err(|e| ClientError::Decode(e.to_string()))?;
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Value::Object(fields) = value {
        for (key, value) in fields {
            match value {
                Value::Null => {}
                Value::String(s) => {
                    serializer.append_pair(&key, &s);
                }
                other => {
                    serializer.append_pair(&key, &other.to_string());
                }
            }
        }
    }
    Ok(serializer.finish())
}

/// `/v1/users?<query>`. The `?` is always present, even with no parameters.
pub(crate) fn users_path(query: &UserQuery) -> Result<String, ClientError> {
    Ok(format!("/v1/users?{}", query_string(query)?))
}

fn with_query<T: Serialize>(path: &str, query: &T) -> Result<String, ClientError> {
    let qs = query_string(query)?;
    if qs.is_empty() {
        Ok(path.to_string())
    } else {
        Ok(format!("{path}?{qs}"))
    }
}
