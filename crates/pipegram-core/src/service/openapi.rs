//! OpenAPI 3.0.3 description of the HTTP surface and a Swagger UI page.

use serde_json::{json, Map, Value};

/// Swagger UI page served at `/apidocs`, loading `/openapi.json`.
pub const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>pipegram API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
    };
  </script>
</body>
</html>
"##;

fn string_props(fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "string" })))
        .collect()
}

fn json_body(required: &[&str], optional: &[&str]) -> Value {
    let mut all: Vec<&str> = required.to_vec();
    all.extend_from_slice(optional);
    json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": {
                    "type": "object",
                    "required": required,
                    "properties": string_props(&all),
                }
            }
        }
    })
}

fn query_param(name: &str) -> Value {
    json!({ "in": "query", "name": name, "required": true, "schema": { "type": "string" } })
}

fn path_param(name: &str) -> Value {
    json!({ "in": "path", "name": name, "required": true, "schema": { "type": "string" } })
}

fn ok(description: &str, schema: Value) -> Value {
    json!({
        "200": {
            "description": description,
            "content": { "application/json": { "schema": schema } }
        },
        "400": { "$ref": "#/components/responses/BadRequest" },
        "401": { "$ref": "#/components/responses/Unauthorized" },
        "403": { "$ref": "#/components/responses/Forbidden" },
        "404": { "$ref": "#/components/responses/NotFound" }
    })
}

fn operation(tag: &str, summary: &str, responses: Value) -> Map<String, Value> {
    let mut op = Map::new();
    op.insert("tags".into(), json!([tag]));
    op.insert("summary".into(), json!(summary));
    op.insert("security".into(), json!([{ "bearerAuth": [] }]));
    op.insert("responses".into(), responses);
    op
}

fn with_body(mut op: Map<String, Value>, body: Value) -> Value {
    op.insert("requestBody".into(), body);
    Value::Object(op)
}

fn with_params(mut op: Map<String, Value>, params: Vec<Value>) -> Value {
    op.insert("parameters".into(), Value::Array(params));
    Value::Object(op)
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn publish_op(summary: &str) -> Value {
    with_body(
        operation("Posts", summary, ok("Media published", schema_ref("PublishResponse"))),
        json_body(&["username"], &["caption", "url", "base64"]),
    )
}

/// Build the OpenAPI document for every route.
pub fn openapi_document() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "pipegram API",
            "version": crate::VERSION,
            "description": "Session-backed HTTP facade for publishing posts, stories and reels, \
                            sending direct messages and reading profiles and stories."
        },
        "servers": [{ "url": "/" }],
        "tags": [
            { "name": "Auth", "description": "Authentication and sessions" },
            { "name": "Posts", "description": "Feed, story and reel publishing" },
            { "name": "DM", "description": "Direct messages" },
            { "name": "Profile", "description": "Profile operations" },
            { "name": "Stories", "description": "Story retrieval" }
        ],
        "paths": paths(),
        "components": components(),
    })
}

fn paths() -> Value {
    let message = schema_ref("MessageResponse");

    json!({
        "/auth/login": {
            "post": with_body(
                operation("Auth", "Log in with username and password", ok("Session created", schema_ref("LoginResponse"))),
                json_body(&["username", "password"], &["proxy"]),
            )
        },
        "/auth/resume": {
            "post": with_body(
                operation("Auth", "Resume a stored session", ok("Session resumed", message.clone())),
                json_body(&["username"], &[]),
            )
        },
        "/auth/status": {
            "get": with_params(
                operation("Auth", "Check whether a session is stored", ok("Session status", schema_ref("StatusResponse"))),
                vec![query_param("username")],
            )
        },
        "/auth/delete": {
            "delete": with_body(
                operation("Auth", "Delete a stored session", ok("Session deleted", message.clone())),
                json_body(&["username"], &[]),
            )
        },
        "/auth/login-session": {
            "post": with_body(
                operation("Auth", "Import an exported session", ok("Session imported", message.clone())),
                json!({
                    "required": true,
                    "content": { "application/json": { "schema": {
                        "type": "object",
                        "required": ["username", "session"],
                        "properties": {
                            "username": { "type": "string" },
                            "session": { "type": "object" },
                            "validate": { "type": "boolean" }
                        }
                    }}}
                }),
            )
        },
        "/post/photo-feed": { "post": publish_op("Publish a photo to the feed") },
        "/post/photo-story": { "post": publish_op("Publish a photo story") },
        "/post/video-feed": { "post": publish_op("Publish a video to the feed") },
        "/post/video-story": { "post": publish_op("Publish a video story") },
        "/post/video-reels": { "post": publish_op("Publish a reel") },
        "/dm/send": {
            "post": with_body(
                operation("DM", "Send a text message", ok("Message sent", schema_ref("SendResponse"))),
                json_body(&["username", "toUsername", "message"], &[]),
            )
        },
        "/dm/send-photo": {
            "post": with_body(
                operation("DM", "Send a photo message", ok("Photo sent", schema_ref("SendResponse"))),
                json_body(&["username", "toUsername"], &["url", "base64"]),
            )
        },
        "/dm/inbox": {
            "get": with_params(
                operation("DM", "List inbox threads", ok("Threads", json!({ "type": "array", "items": schema_ref("ThreadSummary") }))),
                vec![query_param("username")],
            )
        },
        "/dm/thread/{thread_id}": {
            "get": with_params(
                operation("DM", "Get thread messages", ok("Thread messages", schema_ref("ThreadMessages"))),
                vec![path_param("thread_id"), query_param("username")],
            )
        },
        "/profile/update-bio": {
            "post": with_body(
                operation("Profile", "Update biography and/or profile picture", ok("Profile updated", message)),
                json_body(&["username"], &["bio", "url", "base64"]),
            )
        },
        "/profile/{targetUsername}": {
            "get": with_params(
                operation("Profile", "Get a user profile", ok("Profile", schema_ref("Profile"))),
                vec![path_param("targetUsername"), query_param("username")],
            )
        },
        "/stories": {
            "get": with_params(
                operation("Stories", "List a user's stories", ok("Stories", json!({ "type": "array", "items": schema_ref("StoryItem") }))),
                vec![query_param("username"), query_param("targetUsername")],
            )
        },
        "/health": {
            "get": {
                "summary": "Health check",
                "responses": { "200": { "description": "Service is up" } }
            }
        }
    })
}

fn components() -> Value {
    json!({
        "securitySchemes": {
            "bearerAuth": {
                "type": "http",
                "scheme": "bearer",
                "description": "Admin token via `Authorization: Bearer <token>`"
            }
        },
        "responses": {
            "BadRequest": { "description": "Invalid input or upstream failure", "content": { "application/json": { "schema": schema_ref("Error") } } },
            "Unauthorized": { "description": "Missing token or credential failure", "content": { "application/json": { "schema": schema_ref("Error") } } },
            "Forbidden": { "description": "Invalid token", "content": { "application/json": { "schema": schema_ref("Error") } } },
            "NotFound": { "description": "Session or resource not found", "content": { "application/json": { "schema": schema_ref("Error") } } }
        },
        "schemas": schemas(),
    })
}

fn schemas() -> Value {
    json!({
        "Error": {
            "type": "object",
            "properties": {
                "error": { "type": "string", "example": "Bad Request" },
                "code": { "type": "string", "example": "BAD_REQUEST_ERROR" },
                "message": { "type": "string" },
                "timestamp": { "type": "integer", "format": "int64" }
            }
        },
        "MessageResponse": {
            "type": "object",
            "properties": { "message": { "type": "string" } }
        },
        "LoginResponse": {
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "session": {
                    "type": "object",
                    "properties": {
                        "username": { "type": "string" },
                        "proxy": { "type": "string", "nullable": true },
                        "settings": { "type": "object" }
                    }
                }
            }
        },
        "StatusResponse": {
            "type": "object",
            "properties": {
                "username": { "type": "string" },
                "active": { "type": "boolean" }
            }
        },
        "PublishResponse": {
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "media": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "pk": { "type": "string" },
                        "code": { "type": "string" },
                        "media_type": { "type": "integer" }
                    }
                }
            }
        },
        "SendResponse": {
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "thread_id": { "type": "string" }
            }
        },
        "ThreadSummary": {
            "type": "object",
            "properties": {
                "thread_id": { "type": "string" },
                "thread_title": { "type": "string", "nullable": true },
                "users": { "type": "array", "items": { "type": "object", "properties": string_props(&["username", "full_name", "profile_pic_url"]) } },
                "last_message": { "type": "string", "nullable": true },
                "last_message_timestamp": { "nullable": true }
            }
        },
        "ThreadMessages": {
            "type": "object",
            "properties": {
                "thread_id": { "type": "string" },
                "messages": { "type": "array", "items": { "type": "object" } }
            }
        },
        "Profile": {
            "type": "object",
            "properties": {
                "pk": { "type": "string" },
                "username": { "type": "string" },
                "full_name": { "type": "string" },
                "biography": { "type": "string" },
                "follower_count": { "type": "integer" },
                "following_count": { "type": "integer" },
                "media_count": { "type": "integer" },
                "is_private": { "type": "boolean" },
                "profile_pic_url": { "type": "string" }
            }
        },
        "StoryItem": {
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "username": { "type": "string" },
                "media_type": { "type": "string", "enum": ["photo", "video"] },
                "media_url": { "type": "string", "nullable": true },
                "taken_at": { "type": "string", "format": "date-time" }
            }
        }
    })
}
