//! HTTP implementation of [`BoardApi`] over `ureq`.

use scena_core::api::{ApiError, BoardApi, routes};
use scena_core::model::{
    Column, ColumnOrder, ColumnReorder, NewColumn, NewTask, ProjectId, Task, TaskId, TaskMove,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const USER_AGENT: &str = concat!("scena-cli/", env!("CARGO_PKG_VERSION"));

/// Blocking client for a scena server.
pub struct HttpBoard {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpBoard {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        tracing::debug!(path, "GET");
        let response = self
            .request("GET", path)
            .call()
            .map_err(|err| map_error("GET", path, err))?;
        decode(path, response)
    }

    fn send<B: Serialize>(
        &self,
        method: &'static str,
        path: &str,
        body: &B,
    ) -> Result<ureq::Response, ApiError> {
        tracing::debug!(method, path, "sending");
        self.request(method, path)
            .send_json(body)
            .map_err(|err| map_error(method, path, err))
    }
}

fn decode<T: DeserializeOwned>(path: &str, response: ureq::Response) -> Result<T, ApiError> {
    response.into_json::<T>().map_err(|err| ApiError::Decode {
        path: path.to_string(),
        reason: err.to_string(),
    })
}

fn map_error(method: &'static str, path: &str, err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => ApiError::Status {
            method,
            path: path.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => ApiError::Transport {
            method,
            path: path.to_string(),
            reason: transport.to_string(),
        },
    }
}

impl BoardApi for HttpBoard {
    fn fetch_columns(&self, project: &ProjectId) -> Result<Vec<Column>, ApiError> {
        self.get_json(&routes::columns(project))
    }

    fn fetch_tasks(&self, project: &ProjectId) -> Result<Vec<Task>, ApiError> {
        self.get_json(&routes::tasks(project))
    }

    fn move_task(
        &self,
        project: &ProjectId,
        task: &TaskId,
        body: &TaskMove,
    ) -> Result<(), ApiError> {
        self.send("PUT", &routes::task(project, task), body)?;
        Ok(())
    }

    fn reorder_columns(&self, project: &ProjectId, items: &[ColumnOrder]) -> Result<(), ApiError> {
        let body = ColumnReorder {
            items: items.to_vec(),
        };
        self.send("PUT", &routes::column_reorder(project), &body)?;
        Ok(())
    }

    fn create_task(&self, project: &ProjectId, new: &NewTask) -> Result<Task, ApiError> {
        let path = routes::tasks(project);
        let response = self.send("POST", &path, new)?;
        decode(&path, response)
    }

    fn create_column(&self, project: &ProjectId, new: &NewColumn) -> Result<Column, ApiError> {
        let path = routes::columns(project);
        let response = self.send("POST", &path, new)?;
        decode(&path, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one request with `status` and `body`, handing back the
    /// raw request text.
    fn one_shot(status: &str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let status = status.to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read line");
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().expect("length");
                }
                head.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut payload = vec![0; content_length];
            reader.read_exact(&mut payload).expect("body");
            head.push_str(&String::from_utf8_lossy(&payload));

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("respond");
            head
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn fetch_tasks_sends_bearer_and_decodes() {
        let (url, server) = one_shot(
            "200 OK",
            r#"[{"id":"t1","title":"Cut","columnId":"c1","order":2}]"#,
        );
        let board = HttpBoard::new(&url, Some("tok".into()), Duration::from_secs(5));
        let tasks = board.fetch_tasks(&"p1".into()).expect("fetch");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].order, 2);

        let request = server.join().expect("server thread");
        assert!(request.starts_with("GET /api/scena/projects/p1/tasks "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok"));
    }

    #[test]
    fn move_sends_camel_case_body() {
        let (url, server) = one_shot("200 OK", "{}");
        let board = HttpBoard::new(&url, None, Duration::from_secs(5));
        board
            .move_task(
                &"p1".into(),
                &"t1".into(),
                &TaskMove {
                    column_id: "c2".into(),
                    order: 0,
                },
            )
            .expect("move");
        let request = server.join().expect("server thread");
        assert!(request.starts_with("PUT /api/scena/projects/p1/tasks/t1 "));
        assert!(request.contains(r#"{"columnId":"c2","order":0}"#));
    }

    #[test]
    fn non_success_status_becomes_status_error() {
        let (url, server) = one_shot("409 Conflict", r#"{"error":"stale"}"#);
        let board = HttpBoard::new(&url, None, Duration::from_secs(5));
        let err = board
            .reorder_columns(&"p1".into(), &[])
            .expect_err("conflict");
        server.join().expect("server thread");
        assert!(matches!(err, ApiError::Status { status: 409, .. }));
    }

    #[test]
    fn garbage_body_becomes_decode_error() {
        let (url, server) = one_shot("200 OK", "not json");
        let board = HttpBoard::new(&url, None, Duration::from_secs(5));
        let err = board.fetch_columns(&"p1".into()).expect_err("garbage");
        server.join().expect("server thread");
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn unreachable_server_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let board = HttpBoard::new(&format!("http://{addr}"), None, Duration::from_secs(2));
        let err = board.fetch_tasks(&"p1".into()).expect_err("refused");
        assert!(matches!(err, ApiError::Transport { .. }));
    }
}
