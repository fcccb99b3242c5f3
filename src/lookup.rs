use crate::types::VehicleAttributes;
use crate::verify::{LookupOutcome, VerificationService};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Vehicle registry lookup over HTTP.
///
/// `GET <base>/<registration>` answers 404 for unknown registrations and a
/// JSON object with `make_model`, `body_type`, `colour` and `year` otherwise.
pub struct HttpLookup {
    base: Url,
    client: reqwest::Client,
}

impl HttpLookup {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, failure::Error> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpLookup { base, client })
    }

    fn url_for(&self, reg_number: &str) -> Result<Url, failure::Error> {
        Ok(self.base.join(reg_number)?)
    }
}

impl VerificationService for HttpLookup {
    fn lookup<'a>(
        &'a self,
        reg_number: &'a str,
    ) -> BoxFuture<'a, Result<LookupOutcome, failure::Error>> {
        async move {
            let url = self.url_for(reg_number)?;
            debug!("Looking up {} at {}", reg_number, url);
            let response = self.client.get(url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(LookupOutcome::NotFound);
            }
            let json: Value = response.error_for_status()?.json().await?;
            Ok(LookupOutcome::Found(parse_vehicle(&json)?))
        }
        .boxed()
    }
}

pub fn parse_vehicle(json: &Value) -> Result<VehicleAttributes, failure::Error> {
    if !json.is_object() {
        bail!("Unexpected vehicle JSON: {}", json);
    }
    let field = |name: &str| json[name].as_str().map(str::to_string);
    let vehicle = VehicleAttributes {
        make_model: field("make_model"),
        body_type: field("body_type"),
        colour: field("colour"),
        year: match &json["year"] {
            Value::Number(year) => Some(year.to_string()),
            year => year.as_str().map(str::to_string),
        },
    };
    if vehicle.make_model.is_none() {
        bail!("Missing make_model in {}", json);
    }
    Ok(vehicle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single canned HTTP response and returns the base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}/vehicles", address)
    }

    #[test]
    fn parses_vehicle_fields() {
        let vehicle = parse_vehicle(&json!({
            "make_model": "FORD FIESTA",
            "body_type": "HATCHBACK",
            "colour": "RED",
            "year": 2014
        }))
        .unwrap();
        assert_eq!(vehicle.make_model.as_deref(), Some("FORD FIESTA"));
        assert_eq!(vehicle.year.as_deref(), Some("2014"));

        assert!(parse_vehicle(&json!({"colour": "RED"})).is_err());
        assert!(parse_vehicle(&json!(["FORD"])).is_err());
    }

    #[test]
    fn joins_registration_onto_base() {
        let lookup = HttpLookup::new("http://localhost:8080/vehicles", Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            lookup.url_for("AB12CDE").unwrap().as_str(),
            "http://localhost:8080/vehicles/AB12CDE"
        );
    }

    #[tokio::test]
    async fn found_and_not_found_responses() {
        let base = serve_once("200 OK", r#"{"make_model": "VAUXHALL CORSA", "year": "2009"}"#)
            .await;
        let lookup = HttpLookup::new(&base, Duration::from_secs(5)).unwrap();
        match lookup.lookup("AB12CDE").await.unwrap() {
            LookupOutcome::Found(vehicle) => {
                assert_eq!(vehicle.make_model.as_deref(), Some("VAUXHALL CORSA"))
            }
            LookupOutcome::NotFound => panic!("expected a vehicle"),
        }

        let base = serve_once("404 Not Found", "").await;
        let lookup = HttpLookup::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(lookup.lookup("ZZ99ZZZ").await.unwrap(), LookupOutcome::NotFound);
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let base = serve_once("200 OK", "<html>oops</html>").await;
        let lookup = HttpLookup::new(&base, Duration::from_secs(5)).unwrap();
        assert!(lookup.lookup("AB12CDE").await.is_err());
    }
}
