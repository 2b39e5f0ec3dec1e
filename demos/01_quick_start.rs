/// quick start - originate a loan and print its amortization schedule
use chrono::{NaiveDate, TimeZone, Utc};
use loan_servicing_rs::{
    EngineConfig, InMemoryAuditLog, InMemoryLoanRepository, LoanServicer, LoanTerms, Money, Rate,
    SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== loan servicing quick start ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
    ));

    let servicer = LoanServicer::new(
        InMemoryLoanRepository::new(),
        InMemoryAuditLog::new(),
        EngineConfig::default(),
    )?;

    let terms = LoanTerms::new(
        Money::from_major(100_000),
        Rate::from_percentage(6),
        12,
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
    );
    let record = servicer.originate(&terms, &time)?;
    let loan_id = record.loan_id();

    println!("loan: {}", loan_id);
    println!("  principal: ${}", record.loan.principal);
    println!("  rate: {} annual", record.loan.annual_rate);
    println!("  monthly payment: ${}", record.loan.current_monthly_payment);
    println!("  status: {:?}", record.loan.status);

    println!("\nschedule");
    println!("--------");
    println!("{:>3}  {:<10}  {:>10}  {:>10}  {:>10}", "#", "due", "amount", "principal", "interest");
    for installment in servicer.schedule(loan_id)? {
        println!(
            "{:>3}  {:<10}  {:>10}  {:>10}  {:>10}",
            installment.sequence,
            installment.due_date,
            installment.amount_due,
            installment.principal_portion,
            installment.interest_portion,
        );
    }

    let total_interest: Money = record.installments.iter().map(|i| i.interest_portion).sum();
    println!("\ntotal interest: ${}", total_interest);

    Ok(())
}
