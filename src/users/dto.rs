use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::users::errors::FieldErrors;
use crate::users::repo_types::User;
use crate::users::validation::UserRecord;

/// Query string and JSON body of one API call.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub query: HashMap<String, String>,
    pub body: Map<String, Value>,
}

impl ApiRequest {
    /// Bodies that are empty or not a JSON object carry no fields.
    pub fn new(query: HashMap<String, String>, body: &[u8]) -> Self {
        let body = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self { query, body }
    }

    /// Looks in the query string first, then the body.
    pub fn param(&self, key: &str) -> Option<String> {
        self.query
            .get(key)
            .cloned()
            .or_else(|| self.body_field(key))
    }

    pub fn body_field(&self, key: &str) -> Option<String> {
        match self.body.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn trimmed_body_field(&self, key: &str) -> Option<String> {
        self.body_field(key).map(|v| v.trim().to_string())
    }
}

/// Required fields absent from a create or update body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFields(pub Vec<&'static str>);

fn require(req: &ApiRequest, fields: &[&'static str]) -> Result<(), MissingFields> {
    let missing: Vec<_> = fields
        .iter()
        .copied()
        .filter(|f| req.body_field(f).is_none())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingFields(missing))
    }
}

pub const CREATE_REQUIRED: &[&str] = &["name", "email"];
pub const UPDATE_REQUIRED: &[&str] = &["id", "name", "email"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
}

impl CreateUserInput {
    pub fn from_request(req: &ApiRequest) -> Result<Self, MissingFields> {
        require(req, CREATE_REQUIRED)?;
        Ok(Self {
            name: req.trimmed_body_field("name").unwrap_or_default(),
            email: req.trimmed_body_field("email").unwrap_or_default(),
            phone: req.trimmed_body_field("phone").filter(|v| !v.is_empty()),
            birth_date: req.trimmed_body_field("birthDate").filter(|v| !v.is_empty()),
        })
    }
}

impl From<CreateUserInput> for UserRecord {
    fn from(input: CreateUserInput) -> Self {
        UserRecord {
            name: Some(input.name),
            email: Some(input.email),
            phone: input.phone,
            birth_date: input.birth_date,
        }
    }
}

/// Update body. `id` stays raw so a non-numeric id can be told apart from a
/// missing one. Optional fields keep the empty string to mean "clear".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUserInput {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
}

impl UpdateUserInput {
    pub fn from_request(req: &ApiRequest) -> Result<Self, MissingFields> {
        require(req, UPDATE_REQUIRED)?;
        Ok(Self {
            id: req.trimmed_body_field("id").unwrap_or_default(),
            name: req.trimmed_body_field("name").unwrap_or_default(),
            email: req.trimmed_body_field("email").unwrap_or_default(),
            phone: req.trimmed_body_field("phone"),
            birth_date: req.trimmed_body_field("birthDate"),
        })
    }

    pub fn into_record(self) -> UserRecord {
        UserRecord {
            name: Some(self.name),
            email: Some(self.email),
            phone: self.phone,
            birth_date: self.birth_date,
        }
    }
}

/// Non-numeric input reads as 0, like a lenient integer cast.
pub fn lenient_int(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: i64,
    pub page_size: i64,
    pub search: String,
}

impl ListQuery {
    /// Returns `None` when the page size is below 1.
    pub fn from_request(req: &ApiRequest, default_page_size: i64) -> Option<Self> {
        let page = req.param("page").map(|v| lenient_int(&v)).unwrap_or(1).max(1);
        let page_size = req
            .param("pageSize")
            .map(|v| lenient_int(&v))
            .unwrap_or(default_page_size);
        if page_size < 1 {
            return None;
        }
        let search = req
            .param("search")
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        Some(Self {
            page,
            page_size,
            search,
        })
    }
}

/// Public representation of a user with the derived display date.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: User,
    pub birth_date_formatted: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let birth_date_formatted = user.birth_date_formatted();
        Self {
            user,
            birth_date_formatted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: i64,
    pub total_pages: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize)]
pub struct UserListData {
    pub users: Vec<UserResponse>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    Fields(FieldErrors),
    Required {
        #[serde(rename = "requiredFields")]
        required_fields: Vec<&'static str>,
    },
}

/// JSON envelope shared by every API response.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorDetails>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(query: &[(&str, &str)], body: Value) -> ApiRequest {
        let query = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiRequest::new(query, body.to_string().as_bytes())
    }

    #[test]
    fn non_object_bodies_are_ignored() {
        assert!(ApiRequest::new(HashMap::new(), b"").body.is_empty());
        assert!(ApiRequest::new(HashMap::new(), b"[1,2]").body.is_empty());
        assert!(ApiRequest::new(HashMap::new(), b"not json").body.is_empty());
    }

    #[test]
    fn params_prefer_query_over_body() {
        let req = request(&[("id", "3")], json!({ "id": 9, "action": "view" }));
        assert_eq!(req.param("id").as_deref(), Some("3"));
        assert_eq!(req.param("action").as_deref(), Some("view"));
    }

    #[test]
    fn create_input_requires_name_and_email() {
        let req = request(&[], json!({ "name": "Alice" }));
        assert_eq!(
            CreateUserInput::from_request(&req).unwrap_err(),
            MissingFields(vec!["email"])
        );
    }

    #[test]
    fn create_input_trims_and_drops_blank_optionals() {
        let req = request(
            &[],
            json!({ "name": " Alice ", "email": "a@x.com ", "phone": "  ", "birthDate": "1990-05-20" }),
        );
        let input = CreateUserInput::from_request(&req).unwrap();
        assert_eq!(input.name, "Alice");
        assert_eq!(input.email, "a@x.com");
        assert_eq!(input.phone, None);
        assert_eq!(input.birth_date.as_deref(), Some("1990-05-20"));
    }

    #[test]
    fn update_input_accepts_numeric_id_and_keeps_empty_optionals() {
        let req = request(&[], json!({ "id": 12, "name": "Bob", "email": "b@x.com", "phone": "" }));
        let input = UpdateUserInput::from_request(&req).unwrap();
        assert_eq!(input.id, "12");
        assert_eq!(input.phone.as_deref(), Some(""));
        assert_eq!(input.birth_date, None);
    }

    #[test]
    fn list_query_defaults_and_clamps() {
        let q = ListQuery::from_request(&request(&[], json!({})), 10).unwrap();
        assert_eq!(q, ListQuery { page: 1, page_size: 10, search: String::new() });

        let q = ListQuery::from_request(
            &request(&[("page", "-4"), ("pageSize", "5"), ("search", " ali ")], json!({})),
            10,
        )
        .unwrap();
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, 5);
        assert_eq!(q.search, "ali");
    }

    #[test]
    fn list_query_rejects_page_size_below_one() {
        assert!(ListQuery::from_request(&request(&[("pageSize", "0")], json!({})), 10).is_none());
        assert!(ListQuery::from_request(&request(&[("pageSize", "abc")], json!({})), 10).is_none());
    }

    #[test]
    fn envelope_omits_empty_parts() {
        let env: Envelope<()> = Envelope {
            success: false,
            message: Some("user not found".into()),
            data: None,
            errors: None,
        };
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({ "success": false, "message": "user not found" })
        );
    }

    #[test]
    fn required_fields_serialize_under_camel_case_key() {
        let details = ErrorDetails::Required {
            required_fields: vec!["name", "email"],
        };
        assert_eq!(
            serde_json::to_value(&details).unwrap(),
            json!({ "requiredFields": ["name", "email"] })
        );
    }
}
