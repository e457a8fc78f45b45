//! Portal protocol tests
//!
//! Run the HTTP transport against a local canned server that speaks the
//! portal's form dialect: one `/index.php` endpoint dispatched on `action`,
//! auto-submit redirect pages in between, and server-rendered HTML as the
//! only state channel.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use sisarv_sync::error::SyncError;
use sisarv_sync::services::PortalClient;

#[derive(Default)]
struct ServerState {
    /// Every POST body, parsed; empty maps are redirect-shim follow-ups
    forms: Mutex<Vec<HashMap<String, String>>>,
    /// Project numbers accepted so far, rendered into the edit screen
    submitted_numbers: Mutex<Vec<u64>>,
    /// Entity ids rendered with a delete action on the edit screen
    deletable_ids: Mutex<Vec<String>>,
    /// Answer every request with the redirect shim
    shim_forever: AtomicBool,
    /// Reject creation requests with HTTP 500
    reject_submit: AtomicBool,
}

impl ServerState {
    fn empty_post_count(&self) -> usize {
        self.forms
            .lock()
            .unwrap()
            .iter()
            .filter(|form| form.is_empty())
            .count()
    }

    fn form_with_action(&self, action: &str) -> Option<HashMap<String, String>> {
        self.forms
            .lock()
            .unwrap()
            .iter()
            .find(|form| form.get("action").map(String::as_str) == Some(action))
            .cloned()
    }
}

const SHIM_PAGE: &str =
    "<html><body><form name=\"redir\"></form><script>document.redir.submit()</script></body></html>";

fn pad(body: &str) -> String {
    // Real portal pages are far above the shim-length heuristic.
    format!("{body}<!-- {} -->", "x".repeat(600))
}

fn login_page() -> String {
    pad(r#"<form><input type="hidden" name="csrf_key" value="tok-789"></form>"#)
}

fn consultation_page() -> String {
    pad(r#"<button onclick="abreTelaCadastroInventarioBotanico('77','consulta')">Editar</button>"#)
}

fn edit_page(state: &ServerState) -> String {
    let rows: String = state
        .submitted_numbers
        .lock()
        .unwrap()
        .iter()
        .map(|n| format!("<tr><td>{n}</td><td>arvore</td></tr>"))
        .collect();
    let deletes: String = state
        .deletable_ids
        .lock()
        .unwrap()
        .iter()
        .map(|id| format!("<button onclick=\"excluiArvore('{id}')\">X</button>"))
        .collect();
    pad(&format!(
        r#"<div id="panelArvores"><table><tbody>{rows}</tbody></table></div>
{deletes}
<select id="nome_popular">
  <option value="">Selecione</option>
  <option value="31">ficus-lira</option>
  <option value="4">Goiaba</option>
</select>
<select id="nome_cientifico">
  <option value="88">Eucalyptus sp.</option>
  <option value="12">Psidium guajava</option>
</select>"#
    ))
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'+' {
            out.push(b' ');
            i += 1;
        } else if bytes[i] == b'%' && i + 2 < bytes.len() {
            match u8::from_str_radix(&value[i + 1..i + 3], 16) {
                Ok(byte) => {
                    out.push(byte);
                    i += 3;
                }
                Err(_) => {
                    out.push(b'%');
                    i += 1;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

async fn read_request(stream: &mut TcpStream) -> (String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let header_end = buf.windows(4).position(|w| w == b"\r\n\r\n");
        if let Some(pos) = header_end {
            let head = String::from_utf8_lossy(&buf[..pos]).into_owned();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            while buf.len() < pos + 4 + content_length {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed mid-body");
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = String::from_utf8_lossy(&buf[pos + 4..pos + 4 + content_length]).into_owned();
            return (head, body);
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-headers");
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn write_response(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    let _ = stream.shutdown().await;
}

async fn handle_connection(mut stream: TcpStream, state: Arc<ServerState>) {
    let (head, body) = read_request(&mut stream).await;
    if head.starts_with("GET") {
        write_response(&mut stream, "200 OK", &pad("<html>home</html>")).await;
        return;
    }

    let form = parse_form(&body);
    let action = form.get("action").cloned().unwrap_or_default();
    state.forms.lock().unwrap().push(form.clone());

    if state.shim_forever.load(Ordering::SeqCst) {
        write_response(&mut stream, "200 OK", SHIM_PAGE).await;
        return;
    }

    let (status, page) = match action.as_str() {
        "AbreTelaLogin" => ("200 OK", login_page()),
        // Authentication answers with the auto-submit page first.
        "AutenticaUsuario" => ("200 OK", SHIM_PAGE.to_string()),
        "AbreTelaConsultaInventarioBotanico" => ("200 OK", consultation_page()),
        "AbreTelaCadastroInventarioBotanico" => ("200 OK", edit_page(&state)),
        "ExcluiArvoreInventarioBotanico" => {
            let id = form
                .get("id_inventario_botanico_especie")
                .cloned()
                .unwrap_or_default();
            state.deletable_ids.lock().unwrap().retain(|d| *d != id);
            ("200 OK", pad("<html>excluido</html>"))
        }
        "IncluiArvoreInventarioBotanico" => {
            if state.reject_submit.load(Ordering::SeqCst) {
                ("500 Internal Server Error", pad("<html>erro interno</html>"))
            } else {
                if let Some(number) = form
                    .get("numero_especie_projeto")
                    .and_then(|v| v.parse().ok())
                {
                    state.submitted_numbers.lock().unwrap().push(number);
                }
                ("200 OK", SHIM_PAGE.to_string())
            }
        }
        // Empty re-POST after a shim: serve whatever the last real action
        // would have rendered.
        "" => {
            let last = state
                .forms
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find_map(|f| f.get("action").cloned())
                .unwrap_or_default();
            match last.as_str() {
                "IncluiArvoreInventarioBotanico" | "AbreTelaCadastroInventarioBotanico" => {
                    ("200 OK", edit_page(&state))
                }
                _ => ("200 OK", pad("<html>home</html>")),
            }
        }
        _ => ("404 Not Found", pad("<html>acao desconhecida</html>")),
    };
    write_response(&mut stream, status, &page).await;
}

async fn start_server() -> (SocketAddr, Arc<ServerState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(ServerState::default());
    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(handle_connection(stream, Arc::clone(&server_state)));
        }
    });
    (addr, state)
}

fn payload(number: &str) -> Vec<(String, String)> {
    vec![
        ("numero_especie_projeto".to_string(), number.to_string()),
        ("nome_popular".to_string(), "31".to_string()),
        ("nome_cientifico".to_string(), "88".to_string()),
    ]
}

#[tokio::test]
async fn login_discovers_inventory_and_submission_round_trips() {
    let (addr, state) = start_server().await;
    let mut client = PortalClient::new(format!("http://{addr}")).unwrap();

    client.login("maria", "s3nha").await.unwrap();
    let auth = state.form_with_action("AutenticaUsuario").unwrap();
    assert_eq!(auth.get("csrf_key").map(String::as_str), Some("tok-789"));
    assert_eq!(auth.get("formusuario").map(String::as_str), Some("maria"));

    let screen = client.open_edit_screen().await.unwrap();
    assert!(screen.existing_numbers.is_empty());
    assert_eq!(screen.common_names.get("Goiaba").map(String::as_str), Some("4"));

    let screen = client.submit_record(&payload("64")).await.unwrap();
    assert!(screen.existing_numbers.contains(&64));

    let create = state
        .form_with_action("IncluiArvoreInventarioBotanico")
        .unwrap();
    assert_eq!(
        create.get("id_inventario_botanico").map(String::as_str),
        Some("77")
    );
    assert_eq!(create.get("origem").map(String::as_str), Some("consulta"));
    assert_eq!(create.get("id_em_edicao").map(String::as_str), Some(""));
    assert_eq!(
        create.get("area_interesse_social").map(String::as_str),
        Some("SIM")
    );
}

#[tokio::test]
async fn endless_redirect_shim_is_followed_a_bounded_number_of_times() {
    let (addr, state) = start_server().await;
    let mut client = PortalClient::new(format!("http://{addr}")).unwrap();
    client.login("maria", "s3nha").await.unwrap();

    state.forms.lock().unwrap().clear();
    state.shim_forever.store(true, Ordering::SeqCst);

    // The last body is still the shim, so no inventory can be located.
    let error = client.open_edit_screen().await.unwrap_err();
    assert!(matches!(error, SyncError::InventoryNotFound));
    assert_eq!(state.empty_post_count(), 5);
}

#[tokio::test]
async fn rejected_submission_surfaces_status_and_payload() {
    let (addr, state) = start_server().await;
    let mut client = PortalClient::new(format!("http://{addr}")).unwrap();
    client.login("maria", "s3nha").await.unwrap();
    client.open_edit_screen().await.unwrap();

    state.reject_submit.store(true, Ordering::SeqCst);
    let error = client.submit_record(&payload("64")).await.unwrap_err();
    let SyncError::Submit {
        status, payload, ..
    } = error
    else {
        panic!("expected a submit rejection, got {error}");
    };
    assert_eq!(status, 500);
    assert!(payload.iter().all(|(key, _)| key != "action"));
    assert!(payload
        .iter()
        .any(|(key, value)| key == "numero_especie_projeto" && value == "64"));
}

#[tokio::test]
async fn delete_batch_issues_one_request_per_entity() {
    let (addr, state) = start_server().await;
    *state.deletable_ids.lock().unwrap() =
        (0..6).map(|n| format!("90{n}")).collect::<Vec<_>>();

    let mut client = PortalClient::new(format!("http://{addr}")).unwrap();
    client.login("maria", "s3nha").await.unwrap();
    let screen = client.open_edit_screen().await.unwrap();
    assert_eq!(screen.deletable_ids.len(), 6);

    let results = client.delete_entries(&screen.deletable_ids).await;
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|(_, error)| error.is_none()));

    let delete_count = state
        .forms
        .lock()
        .unwrap()
        .iter()
        .filter(|form| {
            form.get("action").map(String::as_str) == Some("ExcluiArvoreInventarioBotanico")
        })
        .count();
    assert_eq!(delete_count, 6);

    let refreshed = client.open_edit_screen().await.unwrap();
    assert!(refreshed.deletable_ids.is_empty());
}
