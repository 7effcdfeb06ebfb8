/// Bowtie methodology rules shared by the facilitation agent prompt and the CLI help.
pub const RULES: &str = "\
1. Hazard. A bowtie covers exactly one hazard. A hazard does not happen, it exists. It is part of \
normal operations, often necessary for the business, and describes a controlled state or activity \
that could cause harm (to people, assets, environment, finances or reputation) if control is lost.\n\
2. Top event. The moment control over the hazard is lost. It is a deviation from the desired state \
that happens BEFORE major harm and can still be recovered from. One diagram shows one \
hazard plus top event pair.\n\
3. Threats. Specific, credible causes of the top event. Each threat must lead DIRECTLY AND \
INDEPENDENTLY to the top event. Barrier failures and human errors are not threats, and threats \
are causes of the top event, not of harm.\n\
4. Consequences. Undesired outcomes of the top event that directly cause harm. There is no limit \
on how many consequences a top event has.\n\
5. Barriers. Hardware measures, human measures, or a combination. Preventive barriers sit between \
a threat and the top event and eliminate or block that threat. Mitigative barriers sit between the \
top event and a consequence and reduce or control it. Barriers may be passive hardware, active \
hardware, active hardware plus human, active human, or continuous. Each threat has at most five \
preventive barriers and each consequence at most five mitigative barriers.\n\
6. Layout. Threats, then preventive barriers, then the top event, then mitigative barriers, then \
consequences, read left to right. Everything sits under the single hazard.\n\
7. Formatting. Capitalize the first letter of each word of the hazard. Use sentence case for top \
events, threats, consequences and barriers. Avoid special characters, especially parentheses and \
brackets.\n\
8. Only include what the user provided or explicitly accepted. Leave missing values out rather \
than inventing them.";
