//! Integration tests for the school backend.

use std::sync::{Arc, Mutex};

use axum::{http::HeaderMap, routing::post, Json, Router};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, SmsConfig};
use crate::db::{init_database, Repository};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

/// A logged-in account.
struct Session {
    id: String,
    token: String,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_sms(SmsConfig::default()).await
    }

    async fn with_sms(sms: SmsConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");

        // Create config
        let config = Config {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            access_token_secret: "test-access-secret".to_string(),
            refresh_token_secret: "test-refresh-secret".to_string(),
            access_token_ttl: 3600,
            refresh_token_ttl: 7200,
            cookie_secure: false,
            generated_secrets: false,
            sms,
        };

        let app = create_router(AppState::new(Repository::new(pool), config));

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await.unwrap();
        let status = resp.status();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, Some(token), None)
            .await
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(token), Some(body))
            .await
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, Some(token), Some(body))
            .await
    }

    async fn patch(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PATCH, path, Some(token), Some(body))
            .await
    }

    /// Register an account and log it in. `tag` keeps email and phone unique.
    async fn account(&self, name: &str, role: &str, tag: u32) -> Session {
        let email = format!("{}{}@school.test", name.to_lowercase(), tag);
        let (status, body) = self
            .send(
                reqwest::Method::POST,
                "/api/users/register",
                None,
                Some(json!({
                    "name": name,
                    "email": email,
                    "phone": format!("+1555000{:04}", tag),
                    "password": "password123",
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        let (status, body) = self
            .send(
                reqwest::Method::POST,
                "/api/users/login",
                None,
                Some(json!({ "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        Session {
            id: body["data"]["person"]["id"].as_str().unwrap().to_string(),
            token: body["data"]["accessToken"].as_str().unwrap().to_string(),
        }
    }

    async fn student(&self, head: &Session, roll: &str, class_label: &str) -> String {
        let (status, body) = self
            .post(
                "/api/students/addStudent",
                &head.token,
                json!({
                    "name": format!("Student {}", roll),
                    "rollNumber": roll,
                    "email": format!("{}@pupils.test", roll),
                    "phone": format!("+4477000{}", roll),
                    "dateOfBirth": "2010-04-12",
                    "classLabel": class_label,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "addStudent failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn period(&self, head: &Session, day: &str, number: u32, class_label: &str, teacher: &str) -> String {
        let (status, body) = self
            .post(
                "/api/timetable/addPeriod",
                &head.token,
                json!({
                    "day": day,
                    "periodNumber": number,
                    "subject": "Maths",
                    "classLabel": class_label,
                    "teacherId": teacher,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "addPeriod failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .send(reqwest::Method::GET, "/api/users/getProfile", None, None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = fixture.get("/api/users/getProfile", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_input_uses_error_envelope() {
    let fixture = TestFixture::new().await;

    // Missing password and role
    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/users/register",
            None,
            Some(json!({ "name": "Nobody", "email": "nobody@school.test" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let head = fixture.account("Head", "Headmaster", 1).await;
    let student = fixture.student(&head, "R-1", "10A").await;
    let (status, body) = fixture
        .get(
            &format!("/api/students/{}/attendance?from=yesterday", student),
            &head.token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let fixture = TestFixture::new().await;
    let teacher = fixture.account("Asha", "Teacher", 1).await;

    let (status, body) = fixture.get("/api/users/getProfile", &teacher.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], teacher.id.as_str());
    assert_eq!(body["data"]["role"], "Teacher");
    assert!(body["data"].get("passwordHash").is_none());

    // Login by phone works too
    let (status, _) = fixture
        .send(
            reqwest::Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "phone": "+15550000001", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "asha1@school.test", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let fixture = TestFixture::new().await;
    fixture.account("Ravi", "Teacher", 2).await;

    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/users/register",
            None,
            Some(json!({
                "name": "Ravi Again",
                "email": "ravi2@school.test",
                "phone": "+15550009999",
                "password": "password123",
                "role": "Teacher",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_cookie_auth_refresh_and_logout() {
    let fixture = TestFixture::new().await;
    fixture.account("Meera", "Parent", 3).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/users/login"))
        .json(&json!({ "email": "meera3@school.test", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let cookies: Vec<String> = resp
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("HttpOnly")));
    let access_cookie = cookies
        .iter()
        .find(|c| c.starts_with("accessToken="))
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let body: Value = resp.json().await.unwrap();
    let refresh_token = body["data"]["refreshToken"].as_str().unwrap().to_string();

    // Cookie alone authenticates
    let resp = fixture
        .client
        .get(fixture.url("/api/users/getProfile"))
        .header(reqwest::header::COOKIE, &access_cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Refresh with the token in the body
    let spent_token = refresh_token;
    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/users/refresh-token",
            None,
            Some(json!({ "refreshToken": spent_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access_token = body["data"]["accessToken"].as_str().unwrap().to_string();
    let refresh_token = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(refresh_token, spent_token);

    // A rotated-out token cannot be used again, even within the same second
    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/users/refresh-token",
            None,
            Some(json!({ "refreshToken": spent_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // Logout forgets the refresh token
    let resp = fixture
        .client
        .post(fixture.url("/api/users/logout"))
        .bearer_auth(&access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .all(|v| v.to_str().unwrap().contains("Max-Age=0")));

    let (status, _) = fixture
        .send(
            reqwest::Method::POST,
            "/api/users/refresh-token",
            None,
            Some(json!({ "refreshToken": refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_student_email_conflicts() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 10).await;
    fixture.student(&head, "101", "10A").await;

    let (status, body) = fixture
        .post(
            "/api/students/addStudent",
            &head.token,
            json!({
                "name": "Copycat",
                "rollNumber": "999",
                "email": "101@pupils.test",
                "phone": "+447700000999",
                "dateOfBirth": "2010-01-01",
                "classLabel": "10A",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert!(body["message"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn test_role_gates() {
    let fixture = TestFixture::new().await;
    let teacher = fixture.account("Tara", "Teacher", 11).await;
    let parent = fixture.account("Paul", "Parent", 12).await;

    let (status, body) = fixture
        .post(
            "/api/students/addStudent",
            &teacher.token,
            json!({
                "name": "Nope",
                "rollNumber": "1",
                "email": "nope@pupils.test",
                "phone": "+447700000001",
                "dateOfBirth": "2010-01-01",
                "classLabel": "9B",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = fixture
        .post(
            "/api/announcements",
            &teacher.token,
            json!({ "title": "Hi", "description": "Not allowed" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = fixture
        .post(
            "/api/students/addMarks",
            &parent.token,
            json!({ "studentId": "x", "subject": "Maths", "examType": "Final", "marks": 50 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_marks_validation() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 20).await;
    let teacher = fixture.account("Tom", "Teacher", 21).await;
    let student = fixture.student(&head, "201", "8C").await;

    for marks in [-1.0, 100.5] {
        let (status, body) = fixture
            .post(
                "/api/students/addMarks",
                &teacher.token,
                json!({ "studentId": student, "subject": "Maths", "examType": "Final", "marks": marks }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "marks {}", marks);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let (status, _) = fixture
        .post(
            "/api/students/addMarks",
            &teacher.token,
            json!({ "studentId": "ghost", "subject": "Maths", "examType": "Final", "marks": 60 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = fixture
        .post(
            "/api/students/addMarks",
            &teacher.token,
            json!({ "studentId": student, "subject": "Maths", "examType": "Unit Test", "marks": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["examType"], "Unit Test");
    assert_eq!(body["data"]["teacherId"], teacher.id.as_str());
}

#[tokio::test]
async fn test_marks_analytics_scenario() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 30).await;
    let teacher = fixture.account("Tom", "Teacher", 31).await;
    let student = fixture.student(&head, "301", "10A").await;

    let (status, body) = fixture
        .get(
            &format!("/api/students/{}/analytics/marks", student),
            &teacher.token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["noData"], true);

    let entries = [
        ("Maths", 40.0, "2024-01-15"),
        ("Science", 55.0, "2024-01-20"),
        ("Maths", 70.0, "2024-02-10"),
        ("English", 85.0, "2024-02-12"),
        ("Science", 92.0, "2024-02-25"),
    ];
    for (subject, marks, date) in entries {
        let (status, _) = fixture
            .post(
                "/api/students/addMarks",
                &teacher.token,
                json!({
                    "studentId": student,
                    "subject": subject,
                    "examType": "Midterm",
                    "marks": marks,
                    "examDate": date,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = fixture
        .get(
            &format!("/api/students/{}/analytics/marks", student),
            &teacher.token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["data"]["summary"];
    assert_eq!(body["data"]["noData"], false);
    assert_eq!(summary["count"], 5);
    assert_eq!(summary["mean"], 68.4);
    assert_eq!(summary["median"], 70.0);
    assert_eq!(summary["q1"], 47.5);
    assert_eq!(summary["q3"], 88.5);
    assert_eq!(summary["passRate"], "80.00");
    let grades = &summary["gradeDistribution"];
    assert_eq!(grades["F"], 1);
    assert_eq!(grades["D+"], 1);
    assert_eq!(grades["B"], 1);
    assert_eq!(grades["A"], 1);
    assert_eq!(grades["A+"], 1);

    // Monthly groups carry a trend: 2 records in January, 3 in February
    let (_, body) = fixture
        .get(
            &format!("/api/students/{}/analytics/marks?groupBy=month", student),
            &teacher.token,
        )
        .await;
    let groups = body["data"]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["key"], "2024-01");
    assert_eq!(groups[0]["trend"], 100.0);
    assert_eq!(groups[1]["key"], "2024-02");
    assert_eq!(groups[1]["trend"], 50.0);

    // Subject groups have no trend
    let (_, body) = fixture
        .get(
            &format!("/api/students/{}/analytics/marks?groupBy=subject", student),
            &teacher.token,
        )
        .await;
    let groups = body["data"]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 3);
    assert!(groups.iter().all(|g| g.get("trend").is_none()));

    let (status, _) = fixture
        .get(
            &format!("/api/students/{}/analytics/marks?groupBy=weather", student),
            &teacher.token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The whole class report sees the same records
    let (_, body) = fixture
        .get("/api/analytics/class/10A/marks?subject=maths", &teacher.token)
        .await;
    assert_eq!(body["data"]["summary"]["count"], 2);
}

#[tokio::test]
async fn test_bulk_attendance_is_all_or_nothing() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 40).await;
    let teacher = fixture.account("Tom", "Teacher", 41).await;
    let s1 = fixture.student(&head, "401", "7A").await;
    let s2 = fixture.student(&head, "402", "7A").await;

    let (status, _) = fixture
        .post(
            "/api/students/addattendance",
            &teacher.token,
            json!({
                "date": "2024-03-04",
                "records": [
                    { "studentId": s1, "status": "Present" },
                    { "studentId": "ghost", "status": "Absent" },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = fixture
        .get(&format!("/api/students/{}/attendance", s1), &teacher.token)
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = fixture
        .post(
            "/api/students/addattendance",
            &teacher.token,
            json!({
                "date": "2024-03-04",
                "records": [
                    { "studentId": s1, "status": true },
                    { "studentId": s2, "status": "late" },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // Resubmitting the same day overwrites instead of duplicating
    let (status, _) = fixture
        .post(
            "/api/students/addattendance",
            &teacher.token,
            json!({ "date": "2024-03-04", "records": [{ "studentId": s1, "status": "Absent" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = fixture
        .get(&format!("/api/students/{}/attendance", s1), &teacher.token)
        .await;
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "Absent");

    let (status, _) = fixture
        .post(
            "/api/students/addattendance",
            &teacher.token,
            json!({
                "date": "2024-03-05",
                "records": [
                    { "studentId": s1, "status": "Present" },
                    { "studentId": s1, "status": "Absent" },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Concurrent submissions for the same student and day race; the last writer wins and
/// exactly one record survives.
#[tokio::test]
async fn test_concurrent_attendance_keeps_one_record() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 50).await;
    let teacher = fixture.account("Tom", "Teacher", 51).await;
    let student = fixture.student(&head, "501", "6B").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = fixture.client.clone();
        let url = fixture.url("/api/students/addattendance");
        let token = teacher.token.clone();
        let status = if i % 2 == 0 { "Present" } else { "Absent" };
        let body = json!({ "date": "2024-05-06", "records": [{ "studentId": student, "status": status }] });
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
                .unwrap()
                .status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::CREATED);
    }

    let (_, body) = fixture
        .get(&format!("/api/students/{}/attendance", student), &teacher.token)
        .await;
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    let status = records[0]["status"].as_str().unwrap();
    assert!(status == "Present" || status == "Absent");

    let (_, body) = fixture
        .get(
            &format!("/api/students/{}/analytics/attendance?groupBy=status", student),
            &teacher.token,
        )
        .await;
    assert_eq!(body["data"]["summary"]["total"], 1);
}

#[tokio::test]
async fn test_faculty_attendance_report() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 60).await;
    let teacher = fixture.account("Tom", "Teacher", 61).await;

    for (date, status) in [
        ("2024-01-08", "Present"),
        ("2024-01-09", "Late"),
        ("2024-02-01", "Absent"),
        ("2024-02-02", "Present"),
    ] {
        let (code, _) = fixture
            .post(
                "/api/faculty/attendance",
                &head.token,
                json!({ "date": date, "records": [{ "teacherId": teacher.id, "status": status }] }),
            )
            .await;
        assert_eq!(code, StatusCode::CREATED);
    }

    let (status, body) = fixture
        .get(
            &format!("/api/faculty/{}/analytics/attendance?groupBy=month", teacher.id),
            &head.token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["data"]["summary"];
    assert_eq!(summary["total"], 4);
    assert_eq!(summary["late"], 1);
    assert_eq!(summary["attendanceRate"], "75.00");
    let groups = body["data"]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1]["trend"], -50.0);

    let (status, _) = fixture
        .get(
            &format!("/api/faculty/{}/analytics/attendance?groupBy=subject", teacher.id),
            &head.token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = fixture
        .post(
            "/api/faculty/attendance",
            &teacher.token,
            json!({ "date": "2024-02-05", "records": [{ "teacherId": teacher.id, "status": "Present" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_substitution_excludes_both_teachers() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 70).await;
    let t1 = fixture.account("Alice", "Teacher", 71).await;
    let t2 = fixture.account("Bob", "Teacher", 72).await;
    let t3 = fixture.account("Carol", "Teacher", 73).await;
    let t4 = fixture.account("Dan", "Teacher", 74).await;

    fixture.period(&head, "Monday", 3, "10A", &t1.id).await;
    fixture.period(&head, "Monday", 4, "10B", &t2.id).await;

    // Dan owns Maths, so he ranks first when the hint is given
    let (status, _) = fixture
        .post(
            "/api/subjects",
            &head.token,
            json!({ "name": "Maths", "teacherIds": [t4.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = fixture
        .post(
            "/api/timetable/available-teachers",
            &t3.token,
            json!({ "day": "Monday", "periodNumber": 3, "subject": "maths" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["data"]), vec![t4.id.clone(), t2.id.clone(), t3.id.clone()]);
    assert_eq!(body["data"][0]["qualified"], true);

    let (status, body) = fixture
        .put(
            "/api/timetable/substituteTeacher",
            &head.token,
            json!({
                "day": "Monday",
                "periodNumber": 3,
                "originalTeacherId": t1.id,
                "substituteTeacherId": t2.id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isSubstituted"], true);
    assert_eq!(body["data"]["substituteName"], "Bob");
    let period_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = fixture
        .post(
            "/api/timetable/available-teachers",
            &t3.token,
            json!({ "day": "Monday", "periodNumber": 3 }),
        )
        .await;
    let available = ids(&body["data"]);
    assert!(!available.contains(&t1.id));
    assert!(!available.contains(&t2.id));
    assert_eq!(available, vec![t3.id.clone(), t4.id.clone()]);

    // Timetable shows the substitute by name
    let (_, body) = fixture
        .get("/api/timetable/getTimetable?classLabel=10A", &t3.token)
        .await;
    let monday = &body["data"][0];
    assert_eq!(monday["day"], "Monday");
    assert_eq!(monday["periods"][0]["teacherName"], "Alice");
    assert_eq!(monday["periods"][0]["substituteName"], "Bob");

    // Unknown original period
    let (status, _) = fixture
        .put(
            "/api/timetable/substituteTeacher",
            &head.token,
            json!({
                "day": "Friday",
                "periodNumber": 3,
                "originalTeacherId": t1.id,
                "substituteTeacherId": t2.id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = fixture
        .put(
            "/api/timetable/clearSubstitute",
            &head.token,
            json!({ "periodId": period_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isSubstituted"], false);
    assert!(body["data"].get("substituteId").is_none());
}

/// Two substitutions for the same period race; whichever lands last is kept.
#[tokio::test]
async fn test_concurrent_substitution_last_write_wins() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 80).await;
    let t1 = fixture.account("Alice", "Teacher", 81).await;
    let t2 = fixture.account("Bob", "Teacher", 82).await;
    let t3 = fixture.account("Carol", "Teacher", 83).await;
    let period_id = fixture.period(&head, "Tuesday", 2, "9A", &t1.id).await;

    let mut handles = Vec::new();
    for substitute in [t2.id.clone(), t3.id.clone()] {
        let client = fixture.client.clone();
        let url = fixture.url("/api/timetable/substituteTeacher");
        let token = head.token.clone();
        let body = json!({
            "day": "Tuesday",
            "periodNumber": 2,
            "originalTeacherId": t1.id,
            "substituteTeacherId": substitute,
        });
        handles.push(tokio::spawn(async move {
            client
                .put(url)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
                .unwrap()
                .status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let (_, body) = fixture
        .get("/api/timetable/getTimetable?classLabel=9A", &head.token)
        .await;
    let periods = body["data"][0]["periods"].as_array().unwrap();
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0]["id"], period_id.as_str());
    let substitute = periods[0]["substituteId"].as_str().unwrap();
    assert!(substitute == t2.id || substitute == t3.id);
}

#[tokio::test]
async fn test_lesson_plan_workflow() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 90).await;
    let teacher = fixture.account("Tom", "Teacher", 91).await;
    let other = fixture.account("Uma", "Teacher", 92).await;

    let (status, body) = fixture
        .post(
            "/api/lessonPlans/create",
            &teacher.token,
            json!({
                "title": "Fractions",
                "subject": "Maths",
                "grade": "5",
                "section": "A",
                "date": "2024-03-11",
                "duration": 45,
                "objectives": ["Add like fractions"],
                "content": { "introduction": "Pizza slices" },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "Draft");
    assert!(body["data"].get("approvalDetails").is_none());
    let plan_id = body["data"]["id"].as_str().unwrap().to_string();
    let status_path = format!("/api/lessonPlans/{}/status", plan_id);

    // No skipping ahead of review, for the owner or the headmaster
    let (status, body) = fixture
        .patch(&status_path, &teacher.token, json!({ "status": "Completed" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
    let (status, _) = fixture
        .patch(&status_path, &head.token, json!({ "status": "Approved" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, body) = fixture
        .get(&format!("/api/lessonPlans/{}", plan_id), &teacher.token)
        .await;
    assert_eq!(body["data"]["status"], "Draft");
    assert!(body["data"].get("approvalDetails").is_none());

    // Another teacher cannot see or touch it
    let (status, _) = fixture
        .get(&format!("/api/lessonPlans/{}", plan_id), &other.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, body) = fixture.get("/api/lessonPlans/list", &other.token).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = fixture
        .patch(&status_path, &teacher.token, json!({ "status": "Pending" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("approvalDetails").is_none());

    // Only a headmaster approves
    let (status, _) = fixture
        .patch(&status_path, &teacher.token, json!({ "status": "Approved" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = fixture
        .patch(
            &status_path,
            &head.token,
            json!({ "status": "Approved", "comments": "Good pacing" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Approved");
    assert_eq!(body["data"]["approvalDetails"]["approvedBy"], head.id.as_str());
    assert_eq!(body["data"]["approvalDetails"]["comments"], "Good pacing");

    let (status, body) = fixture
        .patch(&status_path, &teacher.token, json!({ "status": "Archived" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = fixture
        .patch(&status_path, &teacher.token, json!({ "status": "Draft" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = fixture
        .patch(&status_path, &teacher.token, json!({ "status": "Completed" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["approvalDetails"]["approvedBy"], head.id.as_str());

    // Finished plans are frozen
    let (status, _) = fixture
        .patch(
            &format!("/api/lessonPlans/{}", plan_id),
            &teacher.token,
            json!({ "title": "Too late" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = fixture
        .get("/api/lessonPlans/list?status=Completed", &head.token)
        .await;
    assert_eq!(ids(&body["data"]), vec![plan_id]);
}

#[tokio::test]
async fn test_lesson_plan_edit() {
    let fixture = TestFixture::new().await;
    let teacher = fixture.account("Tom", "Teacher", 95).await;

    let (_, body) = fixture
        .post(
            "/api/lessonPlans/create",
            &teacher.token,
            json!({
                "title": "Plants",
                "subject": "Science",
                "grade": "4",
                "date": "2024-04-02",
                "duration": 40,
            }),
        )
        .await;
    let plan_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = fixture
        .patch(
            &format!("/api/lessonPlans/{}", plan_id),
            &teacher.token,
            json!({ "title": "Plants and light", "materials": ["Seedlings", "Lamp"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Plants and light");
    assert_eq!(body["data"]["subject"], "Science");
    assert_eq!(body["data"]["materials"][1], "Lamp");

    let (_, body) = fixture
        .get(&format!("/api/lessonPlans/{}", plan_id), &teacher.token)
        .await;
    assert_eq!(body["data"]["materials"].as_array().unwrap().len(), 2);

    // Required fields cannot be blanked out
    for field in ["title", "subject", "grade"] {
        let mut edit = serde_json::Map::new();
        edit.insert(field.to_string(), json!("  "));
        let (status, body) = fixture
            .patch(
                &format!("/api/lessonPlans/{}", plan_id),
                &teacher.token,
                Value::Object(edit),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "field {}", field);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
    let (_, body) = fixture
        .get(&format!("/api/lessonPlans/{}", plan_id), &teacher.token)
        .await;
    assert_eq!(body["data"]["subject"], "Science");
    assert_eq!(body["data"]["grade"], "4");
}

#[tokio::test]
async fn test_send_sms_through_gateway() {
    let received: Arc<Mutex<Vec<(Option<String>, Value)>>> = Arc::new(Mutex::new(Vec::new()));

    // Throwaway gateway
    let sink = received.clone();
    let gateway = Router::new().route(
        "/send",
        post(move |headers: HeaderMap, Json(payload): Json<Value>| {
            let sink = sink.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                sink.lock().unwrap().push((auth, payload));
                Json(json!({ "status": "queued" }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, gateway).await.unwrap();
    });

    let fixture = TestFixture::with_sms(SmsConfig {
        gateway_url: Some(format!("http://{}/send", gateway_addr)),
        api_key: Some("gateway-key".to_string()),
        sender_id: "SCHOOL".to_string(),
    })
    .await;
    let head = fixture.account("Head", "Headmaster", 100).await;

    let (status, body) = fixture
        .post(
            "/api/sms/send-sms",
            &head.token,
            json!({ "to": ["+919876543210", "+15550100123"], "message": "PTM on Friday" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["recipients"], 2);
    assert_eq!(body["data"]["gatewayResponse"]["status"], "queued");

    let calls = received.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.as_deref(), Some("Bearer gateway-key"));
    assert_eq!(calls[0].1["sender"], "SCHOOL");
    assert_eq!(calls[0].1["message"], "PTM on Friday");
    assert_eq!(calls[0].1["to"].as_array().unwrap().len(), 2);

    let (status, _) = fixture
        .post(
            "/api/sms/send-sms",
            &head.token,
            json!({ "to": ["12"], "message": "bad number" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sms_gateway_failure_is_upstream_error() {
    let fixture = TestFixture::with_sms(SmsConfig {
        // Nothing listens on port 9 locally
        gateway_url: Some("http://127.0.0.1:9/send".to_string()),
        api_key: None,
        sender_id: "SCHOOL".to_string(),
    })
    .await;
    let head = fixture.account("Head", "Headmaster", 110).await;

    let (status, body) = fixture
        .post(
            "/api/sms/send-sms",
            &head.token,
            json!({ "to": ["+15550100123"], "message": "Hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_announcements_newest_first() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 120).await;
    let parent = fixture.account("Pia", "Parent", 121).await;

    for title in ["Sports day", "Exam schedule"] {
        let (status, _) = fixture
            .post(
                "/api/announcements",
                &head.token,
                json!({ "title": title, "description": "See notice board" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    }

    let (status, body) = fixture.get("/api/announcements", &parent.token).await;
    assert_eq!(status, StatusCode::OK);
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["title"], "Exam schedule");
    assert_eq!(list[0]["createdBy"], head.id.as_str());

    let (status, _) = fixture
        .post(
            "/api/announcements",
            &head.token,
            json!({ "title": " ", "description": "Empty title" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_students_and_subjects_listing() {
    let fixture = TestFixture::new().await;
    let head = fixture.account("Head", "Headmaster", 130).await;
    let teacher = fixture.account("Tom", "Teacher", 131).await;
    let s1 = fixture.student(&head, "1301", "5A").await;
    fixture.student(&head, "1302", "5B").await;

    let (_, body) = fixture
        .get("/api/students?classLabel=5A", &teacher.token)
        .await;
    assert_eq!(ids(&body["data"]), vec![s1.clone()]);

    let (status, _) = fixture.get("/api/students/nope", &teacher.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = fixture
        .post(
            "/api/subjects",
            &head.token,
            json!({ "name": "History", "teacherIds": [teacher.id], "studentIds": [s1] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["studentIds"][0], s1.as_str());

    // A headmaster cannot own a subject
    let (status, _) = fixture
        .post(
            "/api/subjects",
            &head.token,
            json!({ "name": "Art", "teacherIds": [head.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = fixture.get("/api/subjects", &teacher.token).await;
    let subjects = body["data"].as_array().unwrap();
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0]["teacherIds"][0], teacher.id.as_str());

    let (_, body) = fixture.get("/api/users/teachers", &head.token).await;
    assert_eq!(ids(&body["data"]), vec![teacher.id.clone()]);
}
