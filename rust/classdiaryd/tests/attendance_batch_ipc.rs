
use serde_json::json;
use test_support::{request, request_err_code, request_ok, seed_class, spawn_sidecar, temp_dir};

#[test]
fn save_batch_upserts_and_accepts_legacy_codes() {
    let workspace = temp_dir("classdiary-attendance-batch");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, students) =
        seed_class(&mut stdin, &mut reader, &workspace, "C1", &["Ana", "Bea"]);

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.saveBatch",
        json!({ "records": [
            { "studentId": students[0], "classId": class_id, "date": "2024-04-10", "status": "falta" },
            { "studentId": students[1], "classId": class_id, "date": "2024-04-10" }
        ] }),
    );
    assert_eq!(saved.get("count").and_then(|v| v.as_u64()), Some(2));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.saveBatch",
        json!({ "records": [
            { "studentId": students[0], "classId": class_id, "date": "2024-04-10",
              "status": "late", "justification": "Bus delay" }
        ] }),
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.list",
        json!({ "classId": class_id, "date": "2024-04-10" }),
    );
    let records = listed
        .get("attendances")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(records.len(), 2);
    let ana = records
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_str()) == Some(students[0].as_str()))
        .expect("ana");
    assert_eq!(ana.get("status").and_then(|v| v.as_str()), Some("late"));
    assert_eq!(ana.get("justification").and_then(|v| v.as_str()), Some("Bus delay"));
    let bea = records
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_str()) == Some(students[1].as_str()))
        .expect("bea");
    assert_eq!(bea.get("status").and_then(|v| v.as_str()), Some("present"));
}

#[test]
fn save_batch_is_all_or_nothing() {
    let workspace = temp_dir("classdiary-attendance-atomic");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, students) = seed_class(&mut stdin, &mut reader, &workspace, "C1", &["Ana"]);

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.saveBatch",
        json!({ "records": [
            { "studentId": students[0], "classId": class_id, "date": "2024-04-10" },
            { "studentId": "ghost", "classId": class_id, "date": "2024-04-10" }
        ] }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    let error = resp.get("error").cloned().unwrap_or_default();
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("validation_failed"));
    let details = error.get("details").cloned().unwrap_or_default();
    assert_eq!(details.get("field").and_then(|v| v.as_str()), Some("studentId"));
    assert_eq!(details.get("index").and_then(|v| v.as_u64()), Some(1));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.saveBatch",
        json!({ "records": [
            { "studentId": students[0], "classId": class_id, "date": "10/04/2024" }
        ] }),
    );
    assert_eq!(code, "validation_failed");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.list",
        json!({ "classId": class_id }),
    );
    assert_eq!(
        listed
            .get("attendances")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );
}

#[test]
fn student_from_another_class_is_a_validation_failure() {
    let workspace = temp_dir("classdiary-attendance-other-class");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, students) = seed_class(&mut stdin, &mut reader, &workspace, "C1", &["Ana"]);
    let other = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "C2" }),
    );
    let other_id = other
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.saveBatch",
        json!({ "records": [
            { "studentId": students[0], "classId": other_id, "date": "2024-04-10" }
        ] }),
    );
    let error = resp.get("error").cloned().unwrap_or_default();
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("validation_failed"));
    assert_eq!(
        error.pointer("/details/field").and_then(|v| v.as_str()),
        Some("studentId")
    );
    assert_eq!(error.pointer("/details/index").and_then(|v| v.as_u64()), Some(0));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.list",
        json!({ "classId": class_id }),
    );
    assert_eq!(
        listed
            .get("attendances")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );
}

#[test]
fn same_day_lessons_are_kept_apart() {
    let workspace = temp_dir("classdiary-attendance-lessons");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, students) = seed_class(&mut stdin, &mut reader, &workspace, "C1", &["Ana"]);

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.saveBatch",
        json!({ "records": [
            { "studentId": students[0], "classId": class_id, "date": "2024-04-10",
              "lessonNumber": 1, "status": "present" },
            { "studentId": students[0], "classId": class_id, "date": "2024-04-10",
              "lessonNumber": 2, "status": "absent" }
        ] }),
    );
    assert_eq!(saved.get("count").and_then(|v| v.as_u64()), Some(2));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.list",
        json!({ "classId": class_id, "date": "2024-04-10" }),
    );
    let records = listed
        .get("attendances")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(records.len(), 2);
    let mut lessons: Vec<(i64, String)> = records
        .iter()
        .map(|r| {
            (
                r.get("lessonNumber").and_then(|v| v.as_i64()).unwrap_or(0),
                r.get("status").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            )
        })
        .collect();
    lessons.sort();
    assert_eq!(
        lessons,
        vec![(1, "present".to_string()), (2, "absent".to_string())]
    );
}

#[test]
fn class_log_save_upserts_by_id() {
    let workspace = temp_dir("classdiary-classlog-save");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, _students) = seed_class(&mut stdin, &mut reader, &workspace, "C1", &["Ana"]);

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classLogs.save",
        json!({ "log": { "classId": class_id, "date": "2024-04-10", "content": "Maps" } }),
    );
    let log_id = first
        .get("logId")
        .and_then(|v| v.as_str())
        .expect("logId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classLogs.save",
        json!({ "log": { "id": log_id, "classId": class_id, "date": "2024-04-10",
                         "content": "Maps and scale", "activities": "Atlas work" } }),
    );

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "diary.history",
        json!({ "classId": class_id }),
    );
    let logs = history
        .get("logs")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].get("content").and_then(|v| v.as_str()), Some("Maps and scale"));
    assert_eq!(logs[0].get("activities").and_then(|v| v.as_str()), Some("Atlas work"));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "4",
        "classLogs.save",
        json!({ "log": { "classId": class_id, "date": "2024-04-10", "content": "" } }),
    );
    assert_eq!(code, "validation_failed");
}
