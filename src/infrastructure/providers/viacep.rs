//! ViaCEP address source (`viacep.com.br`).

use serde::Deserialize;
use url::Url;

use super::adapter::ProviderSource;
use crate::domain::entities::Address;
use crate::domain::lookup::Lookup;

pub const VIACEP_BASE_URL: &str = "https://viacep.com.br/ws/";

#[derive(Debug, Deserialize)]
struct ViaCepPayload {
    #[serde(default)]
    erro: Option<serde_json::Value>,
    #[serde(default)]
    cep: String,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
}

/// ViaCEP answers unknown CEPs with `200 {"erro": true}` and malformed ones
/// with 400. It never returns coordinates.
#[derive(Debug, Clone)]
pub struct ViaCepSource {
    base_url: String,
}

impl ViaCepSource {
    pub fn new() -> Self {
        Self::with_base_url(VIACEP_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for ViaCepSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderSource<Address> for ViaCepSource {
    fn name(&self) -> &str {
        "viacep"
    }

    fn endpoint(&self, cep: &str) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)?.join(&format!("{}/json/", cep))
    }

    fn parse(&self, body: &str) -> Result<Lookup<Address>, String> {
        let payload: ViaCepPayload = serde_json::from_str(body).map_err(|e| e.to_string())?;

        // Older responses send the flag as the string "true".
        let missing = match &payload.erro {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(flag)) => flag == "true",
            _ => false,
        };
        if missing {
            return Ok(Lookup::NotFound);
        }

        let cep: String = payload.cep.chars().filter(char::is_ascii_digit).collect();
        Ok(Lookup::Found(Address::new(
            cep,
            payload.logradouro,
            payload.bairro,
            payload.localidade,
            payload.uf,
        )))
    }

    fn is_not_found_status(&self, status: u16) -> bool {
        status == 400 || status == 404
    }
}
