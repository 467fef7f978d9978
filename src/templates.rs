use crate::processing::ConvertedFit;

fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(total) => {
            let rounded = total.round().max(0.0) as u64;
            let hours = rounded / 3600;
            let minutes = (rounded % 3600) / 60;
            let seconds = rounded % 60;

            if hours > 0 {
                format!("{}h {:02}m {:02}s", hours, minutes, seconds)
            } else {
                format!("{}m {:02}s", minutes, seconds)
            }
        }
        None => "—".to_string(),
    }
}

fn format_distance(meters: Option<f64>) -> String {
    match meters {
        Some(distance) if distance >= 1000.0 => format!("{:.2} km", distance / 1000.0),
        Some(distance) => format!("{:.0} m", distance),
        None => "—".to_string(),
    }
}

/// Speed shown as running pace.
fn format_pace(speed: Option<f64>) -> String {
    match speed {
        Some(value) if value > 0.0 => {
            let total_minutes = 1000.0 / (value * 60.0);
            let whole_minutes = total_minutes.floor();
            let mut seconds = ((total_minutes - whole_minutes) * 60.0).round();

            // Account for rounding up to the next minute when seconds hit 60.
            let mut minutes = whole_minutes as u64;
            if seconds >= 60.0 {
                minutes += 1;
                seconds = 0.0;
            }

            format!("{}:{:02} min/km", minutes, seconds as u64)
        }
        _ => "—".to_string(),
    }
}

fn format_heart_rate(value: Option<f64>) -> String {
    match value {
        Some(hr) if hr.is_finite() && hr > 0.0 => format!("{:.0} bpm", hr.round()),
        _ => "—".to_string(),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn summary_card(label: &str, value: &str) -> String {
    format!(
        "<div class=\"summary-card\"><p class=\"label\">{label}</p><p class=\"value\">{}</p></div>",
        escape_html(value)
    )
}

pub fn render_landing_page() -> String {
    include_str!("../templates/landing.html").to_string()
}

pub fn render_converted(converted: &ConvertedFit, download_url: &str) -> String {
    let mut body = String::new();
    let summary = &converted.summary;

    body.push_str("<section class=\"results-card\">");
    body.push_str(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">Workout Overview</p><h2>Converted FIT file</h2></div>",
    );
    body.push_str(&format!(
        "<a class=\"cta\" download href=\"{}\">Download TCX</a>",
        escape_html(download_url)
    ));
    body.push_str("</div>");

    body.push_str("<div class=\"summary-grid\">");
    let cards = [
        ("Workout Duration", format_duration(summary.duration_seconds)),
        (
            "Workout Type",
            summary
                .workout_type
                .clone()
                .unwrap_or_else(|| "Unknown".into()),
        ),
        ("Workout Distance", format_distance(summary.distance_meters)),
        ("Pace (slowest)", format_pace(summary.speed_min)),
        ("Pace (mean)", format_pace(summary.speed_mean)),
        ("Pace (fastest)", format_pace(summary.speed_max)),
        ("Heart Rate (min)", format_heart_rate(summary.heart_rate_min)),
        ("Heart Rate (mean)", format_heart_rate(summary.heart_rate_mean)),
        ("Heart Rate (max)", format_heart_rate(summary.heart_rate_max)),
    ];
    for (label, value) in &cards {
        body.push_str(&summary_card(label, value));
    }
    body.push_str("</div>");
    body.push_str(&format!(
        "<pre class=\"notes\">{}</pre>",
        escape_html(&converted.report.notes)
    ));
    body.push_str("</section>");

    body.push_str("<section class=\"results-card\">");
    body.push_str(&format!(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">Laps</p><h2>GPS and footpod comparison for {} laps</h2></div></div>",
        converted.laps.len()
    ));
    body.push_str("<div class=\"table-wrapper\"><table><thead><tr><th>Lap</th>");
    if let Some(first) = converted.laps.first() {
        for field in &first.fields {
            body.push_str(&format!("<th>{}</th>", escape_html(&field.name)));
        }
    }
    body.push_str("</tr></thead><tbody>");

    for lap in &converted.laps {
        body.push_str(&format!("<tr><td>{}</td>", lap.lap_number));
        for field in &lap.fields {
            body.push_str(&format!("<td>{}</td>", escape_html(&field.value)));
        }
        body.push_str("</tr>");
    }

    body.push_str("</tbody></table></div>");
    for lap in &converted.report.laps {
        body.push_str(&format!(
            "<pre class=\"notes lap-notes\">{}</pre>",
            escape_html(&lap.notes)
        ));
    }
    body.push_str("</section>");
    body
}
