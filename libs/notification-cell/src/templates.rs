use chrono::NaiveDate;

fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %e, %Y").to_string()
}

pub fn booking_confirmation_body(
    patient_name: &str,
    doctor_name: &str,
    date: NaiveDate,
    time: &str,
    specialty: &str,
) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #27ae60;">Appointment confirmed</h2>
  <p>Hello {patient_name},</p>
  <p>Your medical appointment has been scheduled.</p>
  <div style="background-color: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0;">
    <h3 style="margin-top: 0;">Appointment details</h3>
    <p><strong>Doctor:</strong> Dr. {doctor_name}</p>
    <p><strong>Specialty:</strong> {specialty}</p>
    <p><strong>Date:</strong> {date}</p>
    <p><strong>Time:</strong> {time}</p>
  </div>
  <p>Please arrive 10 minutes early and bring your ID. If you need to
  cancel, do so at least 24 hours in advance.</p>
  <p>You will receive a reminder the day before your appointment.</p>
</div>"#,
        patient_name = patient_name,
        doctor_name = doctor_name,
        specialty = specialty,
        date = long_date(date),
        time = time,
    )
}

pub fn cancellation_notice_body(
    patient_name: &str,
    doctor_name: &str,
    date: NaiveDate,
    time: &str,
) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #e74c3c;">Appointment cancelled</h2>
  <p>Hello {patient_name},</p>
  <p>Your medical appointment has been cancelled.</p>
  <div style="background-color: #f8d7da; padding: 20px; border-radius: 8px; margin: 20px 0;">
    <h3 style="margin-top: 0;">Cancelled appointment</h3>
    <p><strong>Doctor:</strong> Dr. {doctor_name}</p>
    <p><strong>Date:</strong> {date}</p>
    <p><strong>Time:</strong> {time}</p>
  </div>
  <p>You can book a new appointment from your account at any time.</p>
</div>"#,
        patient_name = patient_name,
        doctor_name = doctor_name,
        date = long_date(date),
        time = time,
    )
}

pub fn reminder_body(
    patient_name: &str,
    doctor_name: &str,
    date: NaiveDate,
    time: &str,
    specialty: &str,
) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #e67e22;">Appointment reminder</h2>
  <p>Hello {patient_name},</p>
  <p>This is a reminder that you have a medical appointment tomorrow.</p>
  <div style="background-color: #fff3cd; padding: 20px; border-radius: 8px; margin: 20px 0;">
    <h3 style="margin-top: 0;">Appointment details</h3>
    <p><strong>Doctor:</strong> Dr. {doctor_name}</p>
    <p><strong>Specialty:</strong> {specialty}</p>
    <p><strong>Date:</strong> {date}</p>
    <p><strong>Time:</strong> {time}</p>
  </div>
  <p>Please arrive 10 minutes early and bring your ID. If you cannot
  attend, cancel in advance so the slot can be reused.</p>
</div>"#,
        patient_name = patient_name,
        doctor_name = doctor_name,
        specialty = specialty,
        date = long_date(date),
        time = time,
    )
}
