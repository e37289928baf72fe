use std::path::PathBuf;
use std::sync::Arc;

use amalianur::enrollment::{
    format_rupiah, AdminConsole, AssumeYes, Confirmer, ConsoleOutcome, DisabledDispatcher,
    EnrollmentForm, EnrollmentService, FormResult, FormView, MemoryDocumentStorage,
    MemoryEnrollmentStore, RawAge, SubmissionReceipt, Upload,
};
use amalianur::error::AppError;
use chrono::Utc;
use clap::Args;

use crate::infra::InquireConfirmer;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Answer the confirmation prompts yourself instead of accepting them.
    #[arg(long)]
    pub(crate) interactive: bool,
    /// Write the exported registrant list to this path.
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let confirmer: Box<dyn Confirmer> = if args.interactive {
        Box::new(InquireConfirmer)
    } else {
        Box::new(AssumeYes::default())
    };

    let service = Arc::new(EnrollmentService::new(
        Arc::new(MemoryEnrollmentStore::new()),
        Arc::new(DisabledDispatcher),
        Arc::new(MemoryDocumentStorage::default()),
    ));
    let mut console = match AdminConsole::open(Arc::clone(&service)) {
        Ok(console) => console,
        Err(err) => {
            println!("Admin console unavailable: {err}");
            return Ok(());
        }
    };

    println!("Yayasan Amalianur enrollment walkthrough");
    let mut form = match EnrollmentForm::open(service.as_ref()) {
        Ok(form) => form,
        Err(err) => {
            println!("Form unavailable: {err}");
            return Ok(());
        }
    };
    render_fees(&form.view());

    println!("\nApplicant 1 attaches a family-card scan");
    fill_draft(&mut form, "Amir Hakim", "Laki-laki", 5, "TK");
    println!("- Fee shown for TK: {}", format_rupiah(form.fee()));
    let scan = Upload {
        file_name: "kartu-keluarga.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89; 2048],
    };
    match form.attach_document(service.as_ref(), scan).await {
        Ok(stored) => println!("- Document stored at {}", stored.public_url),
        Err(err) => println!("- Upload rejected: {err}"),
    }
    submit(&mut form, service.as_ref(), confirmer.as_ref()).await;

    println!("\nApplicant 2 submits without a document");
    fill_draft(&mut form, "Siti Aminah", "Perempuan", 13, "MTS");
    submit(&mut form, service.as_ref(), confirmer.as_ref()).await;

    println!("\nApplicant 3 tries a 6 MB upload");
    let oversized = Upload {
        file_name: "scan.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: vec![0; 6 * 1024 * 1024],
    };
    if let Err(err) = form.attach_document(service.as_ref(), oversized).await {
        println!("- Upload rejected: {err}");
    }

    let now = Utc::now();
    console.sync(now);
    println!("\nAdmin console");
    if let Some(toast) = console.view().toast(now) {
        println!("- Toast: {}", toast.message);
    }
    for record in console.view().records() {
        println!(
            "- {} | {} | {} | {}",
            record.id,
            record.applicant.name,
            record.applicant.tier.code(),
            format_rupiah(record.applicant.computed_fee)
        );
    }

    if let Some(path) = args.export.as_ref() {
        match console.export() {
            Ok(file) => {
                std::fs::write(path, &file.bytes)?;
                println!("- Exported {} to {}", file.file_name, path.display());
            }
            Err(err) => println!("- Export refused: {err}"),
        }
    }

    report("Close enrollment", console.toggle_open());
    form.refresh();
    match form.view() {
        FormView::Closed(notice) => println!(
            "- Form now shows \"{}\" (contact {} / {})",
            notice.title, notice.contact_phone, notice.contact_email
        ),
        FormView::Open(_) => println!("- Form is still open"),
    }

    report("Delete every registrant", console.delete_all(confirmer.as_ref()));
    println!("- Records remaining: {}", console.view().records().len());

    Ok(())
}

fn render_fees(view: &FormView) {
    match view {
        FormView::Open(form) => {
            println!("Form: {}", form.copy.form_title);
            for tier in &form.tiers {
                println!("- {}: {}", tier.label, format_rupiah(tier.fee));
            }
        }
        FormView::Closed(notice) => println!("Form closed: {}", notice.message),
    }
}

fn fill_draft(form: &mut EnrollmentForm, name: &str, sex: &str, age: i64, tier: &str) {
    form.set_tier(tier);
    let draft = form.draft_mut();
    draft.applicant_name = name.to_string();
    draft.sex = sex.to_string();
    draft.age = Some(RawAge::Number(age));
    draft.guardian_phone = "081234567890".to_string();
    draft.address = "Jl. Pendidikan No. 123, Medan".to_string();
    draft.mother_name = "Aisyah".to_string();
    draft.father_name = "Budi".to_string();
    draft.parent_phone = "081298765432".to_string();
}

async fn submit(
    form: &mut EnrollmentForm,
    service: &EnrollmentService<MemoryEnrollmentStore>,
    confirmer: &dyn Confirmer,
) {
    match form.submit(service, confirmer).await {
        Ok(FormResult::Submitted(receipt)) => print_receipt(receipt).await,
        Ok(FormResult::Cancelled) => println!("- Submission cancelled; nothing stored"),
        Err(err) => println!("- Submission rejected: {err}"),
    }
}

async fn print_receipt(receipt: SubmissionReceipt) {
    println!("- {} ({})", receipt.success_title, receipt.record.id);
    println!("  {}", receipt.success_message);
    if let Err(err) = receipt.notification.wait().await {
        println!("  Admin alert not sent: {err}");
    }
}

fn report(action: &str, outcome: ConsoleOutcome) {
    match outcome {
        ConsoleOutcome::Cancelled => println!("- {action}: cancelled"),
        ConsoleOutcome::Refused(message)
        | ConsoleOutcome::Succeeded(message)
        | ConsoleOutcome::Failed(message) => println!("- {action}: {message}"),
    }
}
