// Backend-agnostic integration tests for the Database trait.
//
// Each public async function takes `&dyn Database`, so a further backend only
// needs its own thin test file.

use chrono::{NaiveDate, Utc};

use taskwise_core::activity::{ActivityAction, CreateActivity};
use taskwise_core::attachment::{AttachmentType, CreateAttachment};
use taskwise_core::journal::{CreateJournalNote, Mood, UpdateJournalNote};
use taskwise_core::task::{CreateTask, Priority, TaskFilter, TaskStatus, UpdateTask};
use taskwise_core::user::{NewUser, Role, User, UserChanges, UserFilter};
use taskwise_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn make_user(db: &dyn Database, name: &str, role: Role) -> User {
    db.create_user(&NewUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        password_hash: "hash".into(),
        role,
        jabatan: None,
    })
    .await
    .unwrap()
}

fn make_task(title: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: String::new(),
        status: TaskStatus::Todo,
        priority: Priority::Medium,
        progress: 0,
        due_date: None,
        assignee_id: None,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn note(entry_date: NaiveDate, content: &str) -> CreateJournalNote {
    CreateJournalNote {
        entry_date,
        title: None,
        color: None,
        content: content.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn test_user_crud(db: &dyn Database) {
    let admin = make_user(db, "Admin", Role::Admin).await;
    assert!(admin.is_admin());
    assert_eq!(admin.email, "admin@example.com");

    let fetched = db.get_user(admin.id).await.unwrap();
    assert_eq!(fetched.name, "Admin");

    let by_email = db.find_user_by_email("ADMIN@example.com").await.unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(admin.id));
    assert!(db.find_user_by_email("nobody@example.com").await.unwrap().is_none());

    let updated = db
        .update_user(
            admin.id,
            &UserChanges {
                jabatan: Some(Some("Kepala Divisi".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.jabatan.as_deref(), Some("Kepala Divisi"));
    assert_eq!(updated.name, "Admin");

    let cleared = db
        .update_user(
            admin.id,
            &UserChanges {
                jabatan: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.jabatan, None);

    db.delete_user(admin.id).await.unwrap();
    assert!(matches!(db.get_user(admin.id).await, Err(DbError::NotFound(_))));
    assert!(matches!(db.delete_user(admin.id).await, Err(DbError::NotFound(_))));
}

pub async fn test_duplicate_email_conflicts(db: &dyn Database) {
    make_user(db, "Budi", Role::Employee).await;
    let err = db
        .create_user(&NewUser {
            name: "Budi Dua".into(),
            email: "budi@example.com".into(),
            password_hash: "hash".into(),
            role: Role::Employee,
            jabatan: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}

pub async fn test_user_listing(db: &dyn Database) {
    make_user(db, "Admin", Role::Admin).await;
    for name in ["Citra", "Ani", "Budi", "Dewi"] {
        make_user(db, name, Role::Employee).await;
    }

    let employees = UserFilter {
        role: Some(Role::Employee),
        ..Default::default()
    };
    let all = db.list_users(&employees).await.unwrap();
    let names: Vec<_> = all.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["Ani", "Budi", "Citra", "Dewi"]);
    assert_eq!(db.count_users(&employees).await.unwrap(), 4);

    let page_two = db
        .list_users(&UserFilter {
            limit: Some(2),
            offset: Some(2),
            ..employees.clone()
        })
        .await
        .unwrap();
    let names: Vec<_> = page_two.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["Citra", "Dewi"]);

    let search = UserFilter {
        search: Some("bud".into()),
        ..Default::default()
    };
    assert_eq!(db.list_users(&search).await.unwrap().len(), 1);
    assert_eq!(db.count_users(&search).await.unwrap(), 1);

    let ids: Vec<i64> = all.iter().take(2).map(|u| u.id).collect();
    assert_eq!(db.get_users_by_ids(&ids).await.unwrap().len(), 2);
    assert!(db.get_users_by_ids(&[]).await.unwrap().is_empty());
}

pub async fn test_access_tokens(db: &dyn Database) {
    let user = make_user(db, "Siti", Role::Employee).await;
    let token = db
        .create_access_token(user.id, "login", "abc123")
        .await
        .unwrap();
    assert!(token.last_used_at.is_none());

    let (found, owner) = db.find_access_token("abc123").await.unwrap().unwrap();
    assert_eq!(found.id, token.id);
    assert_eq!(owner.id, user.id);

    db.touch_access_token(token.id).await.unwrap();
    let (touched, _) = db.find_access_token("abc123").await.unwrap().unwrap();
    assert!(touched.last_used_at.is_some());

    assert!(db.find_access_token("nope").await.unwrap().is_none());

    // Tokens die with their user.
    db.delete_user(user.id).await.unwrap();
    assert!(db.find_access_token("abc123").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub async fn test_task_crud(db: &dyn Database) {
    let creator = make_user(db, "Admin", Role::Admin).await;
    let assignee = make_user(db, "Budi", Role::Employee).await;

    let task = db
        .create_task(
            creator.id,
            &CreateTask {
                assignee_id: Some(assignee.id),
                due_date: Some(date(2025, 8, 1)),
                priority: Priority::High,
                ..make_task("Laporan keuangan")
            },
        )
        .await
        .unwrap();
    assert_eq!(task.creator_id, creator.id);
    assert_eq!(task.assignee_id, Some(assignee.id));
    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(task.due_date, Some(date(2025, 8, 1)));

    let updated = db
        .update_task(
            task.id,
            &UpdateTask {
                progress: Some(40),
                due_date: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.progress, 40);
    assert_eq!(updated.due_date, None);
    assert_eq!(updated.priority, Priority::High);

    let done = db
        .update_task(
            task.id,
            &UpdateTask {
                status: Some(TaskStatus::Done),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(done.progress, 100);

    db.delete_task(task.id).await.unwrap();
    assert!(matches!(db.get_task(task.id).await, Err(DbError::NotFound(_))));
}

pub async fn test_task_unknown_assignee_rejected(db: &dyn Database) {
    let creator = make_user(db, "Admin", Role::Admin).await;
    let err = db
        .create_task(
            creator.id,
            &CreateTask {
                assignee_id: Some(999),
                ..make_task("Orphan")
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput(_)));
}

pub async fn test_task_filtering(db: &dyn Database) {
    let admin = make_user(db, "Admin", Role::Admin).await;
    let budi = make_user(db, "Budi", Role::Employee).await;
    let citra = make_user(db, "Citra", Role::Employee).await;

    db.create_task(admin.id, &make_task("Unassigned")).await.unwrap();
    db.create_task(
        admin.id,
        &CreateTask {
            assignee_id: Some(budi.id),
            priority: Priority::High,
            ..make_task("Rapat vendor")
        },
    )
    .await
    .unwrap();
    db.create_task(budi.id, &make_task("Catatan pribadi")).await.unwrap();
    db.create_task(
        admin.id,
        &CreateTask {
            assignee_id: Some(citra.id),
            status: TaskStatus::Review,
            ..make_task("Desain logo")
        },
    )
    .await
    .unwrap();

    let all = db.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(all.len(), 4);
    // Newest first.
    assert_eq!(all[0].title, "Desain logo");
    assert_eq!(all[3].title, "Unassigned");

    let high = db
        .list_tasks(&TaskFilter {
            priority: Some(Priority::High),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(high.len(), 1);

    let review = db
        .list_tasks(&TaskFilter {
            status: Some(TaskStatus::Review),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(review[0].title, "Desain logo");

    let search = db
        .list_tasks(&TaskFilter {
            search: Some("VENDOR".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(search.len(), 1);

    let budi_visible = db
        .list_tasks(&TaskFilter {
            visible_to: Some(budi.id),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut titles: Vec<_> = budi_visible.iter().map(|t| t.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, ["Catatan pribadi", "Rapat vendor"]);

    let today = Utc::now().date_naive();
    let in_range = db
        .list_tasks(&TaskFilter {
            created_from: Some(today),
            created_to: Some(today),
            assignee_id: Some(citra.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(in_range.len(), 1);

    let yesterday = today.pred_opt().unwrap();
    let before = db
        .list_tasks(&TaskFilter {
            created_to: Some(yesterday),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(before.is_empty());
}

pub async fn test_task_children_cascade(db: &dyn Database) {
    let admin = make_user(db, "Admin", Role::Admin).await;
    let task = db.create_task(admin.id, &make_task("Parent")).await.unwrap();

    db.create_comment(task.id, admin.id, "  Mulai besok  ").await.unwrap();
    db.record_activity(&CreateActivity::new(
        task.id,
        admin.id,
        ActivityAction::Created,
        "created the task",
    ))
    .await
    .unwrap();
    db.create_attachment(&CreateAttachment::link(task.id, admin.id, "https://example.com").unwrap())
        .await
        .unwrap();

    db.delete_task(task.id).await.unwrap();
    assert!(db.list_comments(task.id).await.unwrap().is_empty());
    assert!(db.list_activities(task.id).await.unwrap().is_empty());
    assert!(db.list_attachments(task.id).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Attachments, comments, activities
// ---------------------------------------------------------------------------

pub async fn test_attachments(db: &dyn Database) {
    let admin = make_user(db, "Admin", Role::Admin).await;
    let task = db.create_task(admin.id, &make_task("Dokumen")).await.unwrap();

    let upload = db
        .create_attachment(&CreateAttachment::upload(
            task.id,
            admin.id,
            AttachmentType::Image,
            "foto.png",
            "attachments/1/abc/foto.png",
            "image/png",
            2048,
        ))
        .await
        .unwrap();
    assert_eq!(upload.kind, AttachmentType::Image);
    assert_eq!(upload.size_bytes, 2048);
    assert_eq!(upload.url, None);

    let link = db
        .create_attachment(&CreateAttachment::link(task.id, admin.id, "https://example.com/a").unwrap())
        .await
        .unwrap();
    assert_eq!(link.kind, AttachmentType::Link);
    assert_eq!(link.path, None);

    let listed = db.list_attachments(task.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, link.id);

    let removed = db.delete_attachment(upload.id).await.unwrap();
    assert_eq!(removed.path.as_deref(), Some("attachments/1/abc/foto.png"));
    assert!(matches!(db.get_attachment(upload.id).await, Err(DbError::NotFound(_))));
    assert!(matches!(db.delete_attachment(upload.id).await, Err(DbError::NotFound(_))));
}

pub async fn test_comments_and_activities(db: &dyn Database) {
    let admin = make_user(db, "Admin", Role::Admin).await;
    let task = db.create_task(admin.id, &make_task("Diskusi")).await.unwrap();

    let first = db.create_comment(task.id, admin.id, " Pertama ").await.unwrap();
    assert_eq!(first.body, "Pertama");
    db.create_comment(task.id, admin.id, "Kedua").await.unwrap();

    let comments = db.list_comments(task.id).await.unwrap();
    let bodies: Vec<_> = comments.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, ["Pertama", "Kedua"]);

    for action in [ActivityAction::Created, ActivityAction::StatusChanged] {
        db.record_activity(&CreateActivity::new(task.id, admin.id, action, action.as_str()))
            .await
            .unwrap();
    }
    let activities = db.list_activities(task.id).await.unwrap();
    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0].action, ActivityAction::StatusChanged);

    let err = db.create_comment(999, admin.id, "nowhere").await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

pub async fn test_journal_mood(db: &dyn Database) {
    let user = make_user(db, "Ani", Role::Employee).await;
    let day = date(2025, 7, 19);

    assert!(db.get_journal_entry(user.id, day).await.unwrap().is_none());

    let entry = db.set_journal_mood(user.id, day, Some(Mood::Good)).await.unwrap();
    assert_eq!(entry.mood, Some(Mood::Good));

    let again = db.set_journal_mood(user.id, day, Some(Mood::Bad)).await.unwrap();
    assert_eq!(again.id, entry.id);
    assert_eq!(again.mood, Some(Mood::Bad));

    let cleared = db.set_journal_mood(user.id, day, None).await.unwrap();
    assert_eq!(cleared.mood, None);
}

pub async fn test_journal_notes(db: &dyn Database) {
    let user = make_user(db, "Ani", Role::Employee).await;
    let other = make_user(db, "Budi", Role::Employee).await;
    let day = date(2025, 7, 19);

    let first = db
        .create_journal_note(
            user.id,
            &CreateJournalNote {
                title: Some("Pagi".into()),
                color: Some(" yellow ".into()),
                ..note(day, "Olahraga")
            },
        )
        .await
        .unwrap();
    assert_eq!(first.color, "yellow");
    let second = db.create_journal_note(user.id, &note(day, "Rapat")).await.unwrap();
    assert_eq!(second.color, "default");
    assert_eq!(second.title, None);
    assert_eq!(first.journal_entry_id, second.journal_entry_id);

    let entry = db.get_journal_entry(user.id, day).await.unwrap().unwrap();
    assert_eq!(entry.mood, None);
    let notes = db.list_journal_notes(entry.id).await.unwrap();
    let contents: Vec<_> = notes.iter().map(|n| n.content.as_str()).collect();
    assert_eq!(contents, ["Olahraga", "Rapat"]);

    let updated = db
        .update_journal_note(
            user.id,
            first.id,
            &UpdateJournalNote {
                title: Some(None),
                color: Some(" blue ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, None);
    assert_eq!(updated.color, "blue");
    assert_eq!(updated.content, "Olahraga");

    // Someone else's note is invisible.
    let err = db
        .update_journal_note(other.id, first.id, &UpdateJournalNote::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
    assert!(matches!(
        db.delete_journal_note(other.id, first.id).await,
        Err(DbError::NotFound(_))
    ));

    db.delete_journal_note(user.id, first.id).await.unwrap();
    assert_eq!(db.list_journal_notes(entry.id).await.unwrap().len(), 1);
}

pub async fn test_journal_month(db: &dyn Database) {
    let user = make_user(db, "Ani", Role::Employee).await;
    let other = make_user(db, "Budi", Role::Employee).await;

    db.set_journal_mood(user.id, date(2025, 7, 1), Some(Mood::Great)).await.unwrap();
    db.create_journal_note(user.id, &note(date(2025, 7, 15), "a")).await.unwrap();
    db.create_journal_note(user.id, &note(date(2025, 7, 15), "b")).await.unwrap();
    db.set_journal_mood(user.id, date(2025, 7, 31), Some(Mood::Okay)).await.unwrap();
    // Outside the month.
    db.set_journal_mood(user.id, date(2025, 8, 1), Some(Mood::Bad)).await.unwrap();
    // Entry with neither mood nor notes.
    db.set_journal_mood(user.id, date(2025, 7, 20), None).await.unwrap();
    // Another user's day.
    db.set_journal_mood(other.id, date(2025, 7, 2), Some(Mood::Awful)).await.unwrap();

    let days = db
        .journal_month(user.id, date(2025, 7, 1), date(2025, 7, 31))
        .await
        .unwrap();
    let summary: Vec<_> = days
        .iter()
        .map(|d| (d.date, d.mood, d.notes_count))
        .collect();
    assert_eq!(
        summary,
        [
            (date(2025, 7, 1), Some(Mood::Great), 0),
            (date(2025, 7, 15), None, 2),
            (date(2025, 7, 31), Some(Mood::Okay), 0),
        ]
    );
}
