//! Direct-request portal transport
//!
//! Owns the authenticated session against the portal and speaks its form
//! protocol: every interaction is a form POST to `/index.php` distinguished
//! by an `action` value, an initial GET establishes cookies, and responses
//! may be intermediate pages whose only content is a client-side auto-submit
//! redirect, followed transparently up to a fixed number of hops.

use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::error::{SyncError, SyncResult};
use crate::models::EditScreen;
use crate::services::page_extractor;
use crate::transport::SubmissionTransport;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "pt-BR,pt;q=0.9,en;q=0.8";

const ACTION_OPEN_LOGIN: &str = "AbreTelaLogin";
const ACTION_AUTHENTICATE: &str = "AutenticaUsuario";
const ACTION_OPEN_LIST: &str = "AbreTelaConsultaInventarioBotanico";
const ACTION_OPEN_EDIT: &str = "AbreTelaCadastroInventarioBotanico";
const ACTION_DELETE: &str = "ExcluiArvoreInventarioBotanico";
const ACTION_CREATE: &str = "IncluiArvoreInventarioBotanico";

/// Redirect-shim hops followed per response before giving up and returning
/// the last body as-is.
const MAX_SHIM_HOPS: usize = 5;

/// Upper bound on concurrent delete requests.
pub const MAX_DELETE_WORKERS: usize = 4;

/// Characters of a rejected response body kept for diagnosis.
const BODY_EXCERPT_LEN: usize = 800;

/// Worker count for a delete batch: bounded, and never more workers than
/// entities.
pub(crate) fn delete_worker_count(batch_len: usize) -> usize {
    MAX_DELETE_WORKERS.min(batch_len).max(1)
}

/// Authenticated session plus the discovered inventory entity id.
pub struct PortalClient {
    http: Client,
    base_url: String,
    inventory_id: Option<String>,
}

impl PortalClient {
    /// Build a cookie-carrying client for the given portal base URL.
    pub fn new(base_url: impl Into<String>) -> SyncResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );
        let http = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            inventory_id: None,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/index.php", self.base_url)
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> SyncResult<String> {
        let response = self
            .http
            .post(self.endpoint())
            .form(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    /// Follow the portal's JavaScript-redirect pattern: while the body looks
    /// like the shim, re-POST with an empty payload. Bounded at
    /// [`MAX_SHIM_HOPS`]; the last body is returned either way.
    async fn follow_redirect_shim(&self, mut html: String) -> SyncResult<String> {
        for hop in 0..MAX_SHIM_HOPS {
            if !page_extractor::is_redirect_shim(&html) {
                break;
            }
            tracing::debug!(hop, "following redirect shim");
            html = self.post_form(&[]).await?;
        }
        Ok(html)
    }

    /// Authenticate: initial GET for cookies, open the login screen, echo the
    /// scraped CSRF token back with the credentials.
    pub async fn login(&mut self, username: &str, password: &str) -> SyncResult<()> {
        self.http.get(format!("{}/", self.base_url)).send().await?;

        let login_page = self.post_form(&[("action", ACTION_OPEN_LOGIN)]).await?;
        let csrf_key = page_extractor::csrf_token(&login_page).unwrap_or_default();

        let html = self
            .post_form(&[
                ("action", ACTION_AUTHENTICATE),
                ("csrf_key", &csrf_key),
                ("formusuario", username),
                ("formsenha", password),
            ])
            .await
            .map_err(|e| SyncError::LoginFailed(e.to_string()))?;
        self.follow_redirect_shim(html).await?;
        tracing::info!(username, "authenticated against the portal");
        Ok(())
    }

    /// Open the inventory edit screen and scrape its state. The inventory
    /// entity is discovered from the consultation list on first use; there
    /// being none is fatal for the run.
    pub async fn open_edit_screen(&mut self) -> SyncResult<EditScreen> {
        let inventory_id = match &self.inventory_id {
            Some(id) => id.clone(),
            None => {
                let html = self.post_form(&[("action", ACTION_OPEN_LIST)]).await?;
                let html = self.follow_redirect_shim(html).await?;
                let id = page_extractor::edit_screen_entity_id(&html)
                    .ok_or(SyncError::InventoryNotFound)?;
                tracing::info!(inventory_id = %id, "inventory located in search results");
                self.inventory_id = Some(id.clone());
                id
            }
        };

        let html = self
            .post_form(&[
                ("action", ACTION_OPEN_EDIT),
                ("id_inventario_botanico", &inventory_id),
                ("origem", "consulta"),
            ])
            .await?;
        let html = self.follow_redirect_shim(html).await?;
        Ok(page_extractor::edit_screen(&html))
    }

    /// Delete a batch of entities with bounded parallelism. Each deletion is
    /// independent; failures are reported per id, never propagated. The
    /// caller refreshes the edit screen afterward for a consistent view.
    pub async fn delete_entries(&self, ids: &[String]) -> Vec<(String, Option<SyncError>)> {
        if ids.is_empty() {
            return Vec::new();
        }
        let inventory_id = self.inventory_id.clone().unwrap_or_default();
        let workers = delete_worker_count(ids.len());
        tracing::debug!(count = ids.len(), workers, "deleting inventory entries");

        stream::iter(ids.iter().cloned())
            .map(|id| {
                let inventory_id = inventory_id.clone();
                async move {
                    let result = self
                        .post_form(&[
                            ("action", ACTION_DELETE),
                            ("id_inventario_botanico_especie", &id),
                            ("origem", "consulta"),
                            ("id_inventario_botanico", &inventory_id),
                        ])
                        .await;
                    (id, result.err())
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await
    }

    /// Submit one encoded record. A non-2xx response is captured with its
    /// body and the outgoing payload and surfaced as a recoverable
    /// [`SyncError::Submit`]; on success the response page is itself the
    /// refreshed listing and is scraped as such.
    pub async fn submit_record(&self, fields: &[(String, String)]) -> SyncResult<EditScreen> {
        let inventory_id = self.inventory_id.clone().unwrap_or_default();
        let mut form: Vec<(String, String)> = vec![
            ("action".into(), ACTION_CREATE.into()),
            ("id_inventario_botanico".into(), inventory_id),
            ("origem".into(), "consulta".into()),
            ("id_em_edicao".into(), String::new()),
            ("area_interesse_social".into(), "SIM".into()),
        ];
        form.extend(fields.iter().cloned());

        let response = self.http.post(self.endpoint()).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Submit {
                status: status.as_u16(),
                body_excerpt: body.chars().take(BODY_EXCERPT_LEN).collect(),
                payload: form
                    .into_iter()
                    .filter(|(key, _)| key != "action")
                    .collect(),
            });
        }
        let html = self.follow_redirect_shim(response.text().await?).await?;
        Ok(page_extractor::edit_screen(&html))
    }
}

impl SubmissionTransport for PortalClient {
    async fn login(&mut self, username: &str, password: &str) -> SyncResult<()> {
        PortalClient::login(self, username, password).await
    }

    async fn open_edit_screen(&mut self) -> SyncResult<EditScreen> {
        PortalClient::open_edit_screen(self).await
    }

    async fn delete_entries(&self, ids: &[String]) -> Vec<(String, Option<SyncError>)> {
        PortalClient::delete_entries(self, ids).await
    }

    async fn submit_record(&self, fields: &[(String, String)]) -> SyncResult<EditScreen> {
        PortalClient::submit_record(self, fields).await
    }
}
