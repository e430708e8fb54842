use reqwest::blocking::RequestBuilder;

const USER_AGENT: &str = "lab";
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Blocking HTTP client that authenticates every request with a GitLab
/// private token.
pub struct HttpClient {
    reqwest_client: reqwest::blocking::Client,
    private_token: String,
}

impl HttpClient {
    pub fn new(private_token: String) -> Self {
        Self {
            reqwest_client: reqwest::blocking::Client::new(),
            private_token,
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.authenticated(self.reqwest_client.get(url))
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.authenticated(self.reqwest_client.post(url))
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.authenticated(self.reqwest_client.put(url))
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("User-Agent", USER_AGENT)
            .header(TOKEN_HEADER, &self.private_token)
    }
}
