/// prepayment - pay an installment plus extra principal and watch the recast
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use loan_servicing_rs::{
    EngineConfig, InMemoryAuditLog, InMemoryLoanRepository, LoanServicer, LoanTerms, Money,
    PaymentIntent, PaymentMethod, Rate, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== prepayment and recast ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

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
    let loan_id = servicer.originate(&terms, &time)?.loan_id();
    servicer.approve(loan_id, &time)?;
    servicer.activate(loan_id, &time)?;

    let before = servicer.view(loan_id)?;
    println!("before");
    println!("  monthly payment: ${}", before.current_monthly_payment);
    println!("  outstanding: ${}", before.outstanding_balance);

    controller.advance(Duration::days(31));

    // installment 1 is 8606.64; the rest goes to principal
    let intent = PaymentIntent::new(loan_id, Money::from_str_exact("18606.64")?, PaymentMethod::BankTransfer)
        .with_reference("TRX-0001");
    let outcome = servicer.apply_payment(&intent, &time)?;

    println!("\npayment of ${} on {}", intent.amount, time.now().format("%Y-%m-%d"));
    println!("  extra principal: ${}", outcome.excess_principal);
    println!("  unapplied: ${}", outcome.unapplied_amount);
    if let Some(recast) = &outcome.reamortization {
        println!("  action: {:?}", recast.action);
    }

    let after = servicer.view(loan_id)?;
    println!("\nafter");
    println!("  monthly payment: ${}", after.current_monthly_payment);
    println!("  outstanding: ${}", after.outstanding_balance);
    println!("  remaining installments: {}", after.scheduled_installments);

    println!("\nremaining schedule");
    for installment in servicer.schedule(loan_id)?.iter().filter(|i| i.is_scheduled()) {
        println!(
            "  {:>2}  {}  ${:>9}  (principal ${}, interest ${})",
            installment.sequence,
            installment.due_date,
            installment.amount_due,
            installment.principal_portion,
            installment.interest_portion,
        );
    }

    println!("\naudit trail");
    for record in servicer.audit().records() {
        println!("  {}", record.event_kind);
    }

    Ok(())
}
