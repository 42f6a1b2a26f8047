use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        utils::response::ApiResponse::<()>::decl(),
        utils::filter::ListFilter::decl(),
        utils::filter::Page::<()>::decl(),
        db::models::profile::Role::decl(),
        db::models::profile::Profile::decl(),
        db::models::profile::CreateProfile::decl(),
        db::models::profile::UpdateProfile::decl(),
        db::models::profile::RoleCount::decl(),
        db::models::project::ProjectStatus::decl(),
        db::models::project::Project::decl(),
        db::models::project::ProjectWithManager::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::task::TaskStatus::decl(),
        db::models::task::TaskPriority::decl(),
        db::models::task::Task::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTask::decl(),
        db::models::expense::ExpenseCategory::decl(),
        db::models::expense::Expense::decl(),
        db::models::expense::CreateExpense::decl(),
        db::models::expense::UpdateExpense::decl(),
        db::models::incident::IncidentSeverity::decl(),
        db::models::incident::IncidentStatus::decl(),
        db::models::incident::Incident::decl(),
        db::models::incident::CreateIncident::decl(),
        db::models::incident::UpdateIncident::decl(),
        db::models::survey::SurveyStatus::decl(),
        db::models::survey::Survey::decl(),
        db::models::survey::CreateSurvey::decl(),
        db::models::survey::UpdateSurvey::decl(),
        db::models::quote::QuoteStatus::decl(),
        db::models::quote::Quote::decl(),
        db::models::quote::QuoteItem::decl(),
        db::models::quote::QuoteWithItems::decl(),
        db::models::quote::CreateQuoteItem::decl(),
        db::models::quote::CreateQuote::decl(),
        db::models::quote::UpdateQuote::decl(),
        db::models::quote::QuoteTotals::decl(),
        db::models::report::Report::decl(),
        db::models::report::ReportPhoto::decl(),
        db::models::report::ReportWithPhotos::decl(),
        db::models::report::CreateReportPhoto::decl(),
        db::models::report::CreateReport::decl(),
        db::models::report::UpdateReport::decl(),
        db::models::minute::Minute::decl(),
        db::models::minute::CreateMinute::decl(),
        db::models::minute::UpdateMinute::decl(),
        db::models::client_meeting::MeetingStatus::decl(),
        db::models::client_meeting::ClientMeeting::decl(),
        db::models::client_meeting::CreateClientMeeting::decl(),
        db::models::client_meeting::UpdateClientMeeting::decl(),
        db::models::ledger::LedgerKind::decl(),
        db::models::ledger::LedgerEntry::decl(),
        db::models::ledger::CreateLedgerEntry::decl(),
        db::models::ledger::UpdateLedgerEntry::decl(),
        services::services::auth::AuthUser::decl(),
        services::services::dashboard::ProjectKpis::decl(),
        services::services::dashboard::CategoryTotal::decl(),
        services::services::dashboard::StatusCount::<()>::decl(),
        services::services::dashboard::MonthlyPoint::decl(),
        services::services::dashboard::ProjectProgress::decl(),
        services::services::dashboard::KpiLabels::decl(),
        services::services::dashboard::Dashboard::decl(),
        services::services::dashboard::ProjectSummary::decl(),
        services::services::finance::OutflowCategory::decl(),
        services::services::finance::FinanceLabels::decl(),
        services::services::finance::FinanceSummary::decl(),
        services::services::events::Table::decl(),
        services::services::events::ChangeKind::decl(),
        services::services::events::ChangeEvent::decl(),
        services::services::events::LiveMessage::decl(),
        services::services::weather::CurrentWeather::decl(),
        services::services::weather::DailyForecast::decl(),
        services::services::weather::Forecast::decl(),
        server::routes::StatusChange::<()>::decl(),
        server::routes::ProjectScope::decl(),
        server::routes::projects::NewProjectTask::decl(),
        server::routes::tasks::TaskScope::decl(),
        server::routes::expenses::ExpenseDetail::decl(),
        server::routes::incidents::IncidentScope::decl(),
        server::routes::incidents::ResolveIncident::decl(),
        server::routes::surveys::SurveyScope::decl(),
        server::routes::surveys::QuoteFromSurvey::decl(),
        server::routes::reports::PhotoLink::decl(),
        server::routes::reports::ReportDetail::decl(),
        server::routes::client_meetings::MeetingScope::decl(),
        server::routes::finance::SummaryRange::decl(),
        server::routes::login::LoginPage::decl(),
        server::routes::users::RoleChange::decl(),
        server::routes::users::ActiveChange::decl(),
        server::routes::users::UserDirectory::decl(),
        server::routes::weather::WeatherQuery::decl(),
        server::routes::health::Health::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `generate_types`. Do not edit it by hand.\n\n{}\n",
        body
    )
}

fn main() {
    let check = env::args().any(|arg| arg == "--check");
    let out_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let out_file = out_dir.join("types.ts");
    let generated = generate_types_content();

    if check {
        match fs::read_to_string(&out_file) {
            Ok(current) if current == generated => {
                println!("shared/types.ts is up to date");
            }
            _ => {
                eprintln!("shared/types.ts is out of date; run `cargo run --bin generate_types`");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = fs::create_dir_all(&out_dir).and_then(|_| fs::write(&out_file, generated)) {
        eprintln!("failed to write {}: {e}", out_file.display());
        std::process::exit(1);
    }
    println!("wrote {}", out_file.display());
}
