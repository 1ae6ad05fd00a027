#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use lagooz_api::auth::jwt::{generate_access_token, JwtConfig};
use lagooz_api::config::ServerConfig;
use lagooz_api::router::build_app_router;
use lagooz_api::state::AppState;
use lagooz_core::communication::AttachmentLimits;
use lagooz_core::roles::{StaffType, UserRole};
use lagooz_core::targeting::ClassSlot;
use lagooz_db::models::branch::CreateBranch;
use lagooz_db::models::communication::Communication;
use lagooz_db::models::position::CreateStaffAssignment;
use lagooz_db::models::user::{CreateUser, User};
use lagooz_db::repositories::{BranchRepo, PositionRepo, SchoolClassRepo, UserRepo};
use lagooz_events::{CommunicationDelivery, DeliveryError, DeliveryReport, StandardDelivery};

const BOUNDARY: &str = "lagooz-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(storage: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        attachment_limits: AttachmentLimits::default(),
        attachment_storage_dir: storage.path().to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Recording delivery
// ---------------------------------------------------------------------------

/// Collaborator double: records what it was asked to send. When `fail` is
/// set every delivery errors and nothing is recorded.
#[derive(Default)]
pub struct RecordingDelivery {
    pub delivered: Mutex<Vec<Communication>>,
    pub fail: Mutex<bool>,
}

impl RecordingDelivery {
    pub fn delivered_ids(&self) -> Vec<i64> {
        self.delivered.lock().unwrap().iter().map(|c| c.id).collect()
    }
}

#[async_trait]
impl CommunicationDelivery for RecordingDelivery {
    async fn deliver(
        &self,
        communication: &Communication,
    ) -> Result<DeliveryReport, DeliveryError> {
        if *self.fail.lock().unwrap() {
            return Err(DeliveryError::Database(sqlx::Error::PoolTimedOut));
        }
        self.delivered.lock().unwrap().push(communication.clone());
        Ok(DeliveryReport::default())
    }
}

// ---------------------------------------------------------------------------
// Test application
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub config: ServerConfig,
    /// Records sends unless the app was built with [`build_standard_app`].
    pub recorder: Arc<RecordingDelivery>,
    storage: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn token(&self, user: &User) -> String {
        generate_access_token(user.id, user.user_role().unwrap(), &self.config.jwt).unwrap()
    }

    pub fn storage_path(&self) -> &std::path::Path {
        self.storage.path()
    }
}

fn assemble(
    pool: PgPool,
    delivery: Option<Arc<dyn CommunicationDelivery>>,
    configure: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let storage = tempfile::tempdir().unwrap();
    let mut config = test_config(&storage);
    configure(&mut config);
    let recorder = Arc::new(RecordingDelivery::default());

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        delivery: delivery.unwrap_or_else(|| recorder.clone() as Arc<dyn CommunicationDelivery>),
    };

    TestApp {
        router: build_app_router(state, &config),
        config,
        recorder,
        storage,
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool and a recording delivery.
pub fn build_test_app(pool: PgPool) -> TestApp {
    assemble(pool, None, |_| ())
}

/// Same as [`build_test_app`] with the config adjusted first.
pub fn build_test_app_with(pool: PgPool, configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    assemble(pool, None, configure)
}

/// Same as [`build_test_app`] but sends create real in-app deliveries.
pub fn build_standard_app(pool: PgPool) -> TestApp {
    let delivery = Arc::new(StandardDelivery::new(pool.clone(), None));
    assemble(pool, Some(delivery), |_| ())
}

// ---------------------------------------------------------------------------
// Directory fixture
// ---------------------------------------------------------------------------

/// A small two-branch school.
pub struct Directory {
    pub north: i64,
    pub south: i64,
    pub maths: i64,
    pub form_tutor: i64,
    pub slot: ClassSlot,
    pub superadmin: User,
    pub admin: User,
    pub teacher: User,
    pub class_teacher: User,
    pub south_teacher: User,
    pub unplaced_staff: User,
    pub student: User,
    pub parent: User,
}

pub async fn user(
    pool: &PgPool,
    email: &str,
    role: UserRole,
    staff_type: Option<StaffType>,
    branch_id: Option<i64>,
) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            first_name: email.split('@').next().unwrap_or_default().to_string(),
            last_name: "Test".to_string(),
            role,
            staff_type,
            branch_id,
        },
    )
    .await
    .unwrap()
}

pub async fn seed_directory(pool: &PgPool) -> Directory {
    let north = BranchRepo::create(pool, &CreateBranch { name: "North".into() })
        .await
        .unwrap()
        .id;
    let south = BranchRepo::create(pool, &CreateBranch { name: "South".into() })
        .await
        .unwrap()
        .id;

    let maths = PositionRepo::create_teaching(pool, "Mathematics", false).await.unwrap().id;
    let form_tutor = PositionRepo::create_teaching(pool, "Form Tutor", true).await.unwrap().id;

    let class = SchoolClassRepo::create_class(pool, "JSS1").await.unwrap();
    let arm = SchoolClassRepo::create_arm(pool, "A").await.unwrap();
    let slot = ClassSlot {
        student_class_id: class.id,
        class_arm_id: arm.id,
    };

    let superadmin = user(pool, "root@school.test", UserRole::Superadmin, None, None).await;
    let admin = user(pool, "admin@north.test", UserRole::BranchAdmin, None, Some(north)).await;

    let teacher = user(
        pool,
        "teacher@north.test",
        UserRole::Staff,
        Some(StaffType::Teaching),
        Some(north),
    )
    .await;
    PositionRepo::assign_teaching(pool, teacher.id, maths).await.unwrap();

    let class_teacher = user(
        pool,
        "form@north.test",
        UserRole::Staff,
        Some(StaffType::Teaching),
        Some(north),
    )
    .await;
    PositionRepo::create_assignment(
        pool,
        &CreateStaffAssignment {
            user_id: class_teacher.id,
            teaching_position_id: Some(form_tutor),
            student_class_id: Some(slot.student_class_id),
            class_arm_id: Some(slot.class_arm_id),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let south_teacher = user(
        pool,
        "teacher@south.test",
        UserRole::Staff,
        Some(StaffType::Teaching),
        Some(south),
    )
    .await;
    PositionRepo::assign_teaching(pool, south_teacher.id, maths).await.unwrap();

    let unplaced_staff = user(
        pool,
        "nobranch@school.test",
        UserRole::Staff,
        Some(StaffType::Teaching),
        None,
    )
    .await;

    let student = user(pool, "student@north.test", UserRole::Student, None, Some(north)).await;
    SchoolClassRepo::place_student(pool, student.id, slot).await.unwrap();

    let parent = user(pool, "parent@north.test", UserRole::Parent, None, Some(north)).await;
    UserRepo::link_parent(pool, parent.id, student.id).await.unwrap();

    Directory {
        north,
        south,
        maths,
        form_tutor,
        slot,
        superadmin,
        admin,
        teacher,
        class_teacher,
        south_teacher,
        unplaced_staff,
        student,
        parent,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send_auth(app, Method::GET, uri, token).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send_auth(app, Method::DELETE, uri, token).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send_auth(app, Method::POST, uri, token).await
}

async fn send_auth(app: Router, method: Method, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

/// A file part for [`post_multipart_auth`].
pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content: &'a [u8],
}

pub fn multipart_body(fields: &[(&str, &str)], files: &[FilePart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                file.field, file.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    token: &str,
    fields: &[(&str, &str)],
    files: &[FilePart<'_>],
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields, files)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}
