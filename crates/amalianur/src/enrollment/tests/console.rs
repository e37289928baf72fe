use std::sync::Arc;

use chrono::{Duration, Utc};

use super::common::{
    harness, harness_with, submission, Harness, ReadOnlySettingsStore, RecordingDispatcher,
    ScriptedConfirmer,
};
use crate::enrollment::console::{
    AdminConsole, ConsoleOutcome, RecordDetail, RecordListView, TOAST_SECONDS,
};
use crate::enrollment::domain::{
    Applicant, EnrollmentRecord, EnrollmentSettings, LandingPage, RecordId, Sex, Tier,
};
use crate::enrollment::export::{ExportError, EXPORT_FILE_NAME};
use crate::enrollment::memory::MemoryEnrollmentStore;
use crate::enrollment::repository::EnrollmentRepository;
use crate::enrollment::service::{LandingPageInput, SubmitOutcome, DELETE_ALL_PHRASE};
use crate::feed::ChangeEvent;

fn record(id: &str, name: &str, document_url: Option<&str>) -> EnrollmentRecord {
    EnrollmentRecord {
        id: RecordId(id.to_string()),
        applicant: Applicant {
            name: name.to_string(),
            sex: Sex::Female,
            age: 4,
            guardian_phone: "0813".to_string(),
            guardian_email: None,
            address: "Medan".to_string(),
            tier: Tier::Kb,
            mother_name: "Fatimah".to_string(),
            father_name: "Umar".to_string(),
            parent_phone: "0814".to_string(),
            document_url: document_url.map(str::to_string),
            computed_fee: 500_000,
        },
        created_at: Utc::now(),
    }
}

async fn seed(h: &Harness<MemoryEnrollmentStore>, count: usize) {
    for index in 0..count {
        let mut payload = submission();
        payload.applicant_name = format!("Pendaftar {index}");
        match h.service.submit(payload).await.expect("submitted") {
            SubmitOutcome::Accepted(receipt) => {
                receipt.notification.wait().await.expect("alert logged")
            }
            SubmitOutcome::NeedsConfirmation { .. } => panic!("document was attached"),
        }
    }
}

#[test]
fn insert_toast_expires_after_four_seconds() {
    let now = Utc::now();
    let mut view = RecordListView::default();
    view.apply(ChangeEvent::Insert(record("reg-1", "Zahra", None)), now);

    let toast = view.toast(now).expect("toast shown");
    assert_eq!(toast.message, "Pendaftar baru: Zahra");
    assert!(view
        .toast(now + Duration::seconds(TOAST_SECONDS - 1))
        .is_some());
    assert!(view.toast(now + Duration::seconds(TOAST_SECONDS)).is_none());
}

#[test]
fn list_view_applies_inserts_first_and_deletes() {
    let now = Utc::now();
    let mut view = RecordListView::new(vec![record("reg-1", "Zahra", None)]);
    view.apply(ChangeEvent::Insert(record("reg-2", "Hasan", None)), now);
    assert_eq!(view.records()[0].applicant.name, "Hasan");

    view.apply(
        ChangeEvent::Delete {
            id: "reg-1".to_string(),
        },
        now,
    );
    assert_eq!(view.records().len(), 1);
    assert_eq!(view.search("has").len(), 1);
    assert_eq!(view.search("kb").len(), 1);
    assert!(view.search("zahra").is_empty());
}

#[tokio::test]
async fn console_sees_records_inserted_after_opening() {
    let h = harness();
    let mut console = AdminConsole::open(Arc::clone(&h.service)).expect("console opens");
    assert!(console.view().records().is_empty());

    seed(&h, 2).await;
    let now = Utc::now();
    assert_eq!(console.sync(now), 2);
    assert_eq!(console.view().records()[0].applicant.name, "Pendaftar 1");
    assert!(console.view().toast(now).is_some());
}

#[tokio::test]
async fn delete_one_asks_first() {
    let h = harness();
    seed(&h, 1).await;
    let mut console = AdminConsole::open(Arc::clone(&h.service)).expect("console opens");
    let id = console.view().records()[0].id.clone();

    let declined = ScriptedConfirmer::answering(&[false], None);
    assert_eq!(console.delete_one(&id, &declined), ConsoleOutcome::Cancelled);
    assert_eq!(
        declined.asked(),
        vec!["Yakin ingin menghapus data Pendaftar 0?".to_string()]
    );

    let accepted = ScriptedConfirmer::answering(&[true], None);
    assert_eq!(
        console.delete_one(&id, &accepted),
        ConsoleOutcome::Succeeded("Data Pendaftar 0 berhasil dihapus.".to_string())
    );
    assert!(console.view().records().is_empty());
    assert!(h.store.list_records().expect("list").is_empty());
}

#[tokio::test]
async fn delete_all_needs_the_exact_phrase() {
    let h = harness();
    seed(&h, 3).await;
    let mut console = AdminConsole::open(Arc::clone(&h.service)).expect("console opens");

    let wrong = ScriptedConfirmer::answering(&[true], Some("hapus semua"));
    assert!(matches!(
        console.delete_all(&wrong),
        ConsoleOutcome::Refused(_)
    ));
    assert!(wrong.asked()[0].contains("SEMUA 3 data"));
    assert_eq!(h.store.list_records().expect("list").len(), 3);

    let dismissed = ScriptedConfirmer::answering(&[true], None);
    assert_eq!(console.delete_all(&dismissed), ConsoleOutcome::Cancelled);

    let right = ScriptedConfirmer::answering(&[true], Some(DELETE_ALL_PHRASE));
    assert_eq!(
        console.delete_all(&right),
        ConsoleOutcome::Succeeded("Berhasil menghapus 3 data pendaftar.".to_string())
    );
    assert!(console.view().records().is_empty());
    assert!(matches!(
        console.delete_all(&right),
        ConsoleOutcome::Refused(_)
    ));
}

#[tokio::test]
async fn export_writes_one_row_per_record_in_column_order() {
    let h = harness();
    let mut console = AdminConsole::open(Arc::clone(&h.service)).expect("console opens");
    assert!(matches!(console.export(), Err(ExportError::Empty)));

    seed(&h, 2).await;
    console.sync(Utc::now());
    let file = console.export().expect("exported");
    assert_eq!(file.file_name, EXPORT_FILE_NAME);

    let mut reader = csv::Reader::from_reader(file.bytes.as_slice());
    let headers: Vec<String> = reader
        .headers()
        .expect("headers")
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(
        headers,
        vec![
            "No",
            "Nama",
            "Jenis Kelamin",
            "Jenjang",
            "Umur",
            "Telepon",
            "Email",
            "Alamat",
            "Nama Ibu",
            "Nama Ayah",
            "Telepon Ortu",
            "Total Biaya",
            "Tanggal Daftar",
        ]
    );

    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .expect("rows parse");
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][1], "Pendaftar 1");
    assert_eq!(&rows[0][6], "-");
    assert_eq!(&rows[0][7], "Jl. Pendidikan No. 1, Medan");
    assert_eq!(&rows[1][11], "750000");
}

#[test]
fn toggle_reverts_when_the_write_fails() {
    let h = harness_with(ReadOnlySettingsStore::default(), RecordingDispatcher::default());
    let mut console = AdminConsole::open(Arc::clone(&h.service)).expect("console opens");
    assert!(console.is_open());

    let outcome = console.toggle_open();
    assert!(matches!(outcome, ConsoleOutcome::Failed(_)));
    assert!(console.is_open());
}

#[test]
fn toggle_flips_the_gate_and_other_consoles_follow() {
    let h = harness();
    let mut first = AdminConsole::open(Arc::clone(&h.service)).expect("console opens");
    let mut second = AdminConsole::open(Arc::clone(&h.service)).expect("console opens");

    assert_eq!(
        first.toggle_open(),
        ConsoleOutcome::Succeeded("Pendaftaran berhasil ditutup.".to_string())
    );
    assert!(!first.is_open());
    assert!(
        !h.service
            .load::<EnrollmentSettings>()
            .expect("settings")
            .value
            .is_open
    );

    second.sync(Utc::now());
    assert!(!second.is_open());
}

#[tokio::test]
async fn detail_carries_letterhead_and_zoomable_images_only() {
    let h = harness();
    h.service
        .save::<LandingPage, _>(LandingPageInput {
            location: Some("Jl. Amal No. 5".to_string()),
            ..LandingPageInput::default()
        })
        .expect("landing saved");
    seed(&h, 1).await;
    let console = AdminConsole::open(Arc::clone(&h.service)).expect("console opens");
    let id = console.view().records()[0].id.clone();

    let detail = console.detail(&id).expect("detail");
    assert_eq!(detail.letterhead.name, "YAYASAN AMALIANUR");
    assert_eq!(detail.letterhead.address, "Jl. Amal No. 5");
    assert_eq!(detail.fullscreen_url(), Some("memory://pendaftaran/kk.png"));
    let html = detail.print_html();
    assert!(html.contains("Jl. Amal No. 5"));
    assert!(html.contains("Rp750.000"));
    assert!(html.contains("<img"));

    let pdf = RecordDetail {
        record: record("reg-9", "Zahra", Some("https://cdn/kk.pdf?token=1")),
        ..detail
    };
    assert_eq!(pdf.fullscreen_url(), None);
    assert!(pdf.print_html().contains("Dokumen Kartu Keluarga"));

    let scripted = RecordDetail {
        record: record("reg-10", "Lama", Some("javascript:alert(1)")),
        ..pdf
    };
    let html = scripted.print_html();
    assert!(!html.contains("javascript:"), "{html}");
    assert!(html.contains("Tautan dokumen tidak dapat ditampilkan"));
}
